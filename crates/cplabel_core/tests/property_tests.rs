use cplabel_core::{
    AnnotationState, ChangePointAnnotation, ChangePointType, Pager, PlotArea, SampleMapper,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn pages_partition_all_samples(total in 0usize..5_000, page_size in 1usize..700) {
        let pager = Pager::new(total, page_size);
        let mut covered = 0usize;
        let mut expected_start = 0usize;
        for page in 1..=pager.total_pages() {
            let bounds = pager.page_bounds(page).unwrap();
            prop_assert_eq!(bounds.start, expected_start);
            prop_assert!(bounds.len() <= page_size);
            covered += bounds.len();
            expected_start = bounds.end;
        }
        prop_assert_eq!(covered, total);
    }

    #[test]
    fn snapped_pixel_maps_back_to_the_same_sample(
        total in 1usize..2_000,
        page_size in 1usize..400,
        page_pick in 0usize..100,
        pixel in 60.0f64..=740.0,
    ) {
        let mut pager = Pager::new(total, page_size);
        pager.go_to_page(1 + page_pick % pager.total_pages());
        let mapper = SampleMapper::new(pager, PlotArea::new(60.0, 740.0).unwrap());

        let index = mapper.pixel_to_index(pixel).unwrap();
        let bounds = mapper.pager().current_bounds().unwrap();
        prop_assert!(bounds.contains(&index));

        let snapped = mapper.index_to_pixel(index).unwrap();
        prop_assert_eq!(mapper.pixel_to_index(snapped), Some(index));
    }

    #[test]
    fn commit_then_toggle_restores_previous_marks(
        positions in proptest::collection::btree_set(0usize..500, 0..20),
        target in 0usize..500,
    ) {
        let tolerance = 1;
        let base = AnnotationState::with_annotations(positions.iter().map(|&position| {
            ChangePointAnnotation::new(position, ChangePointType::Mean, 0.0)
        }));
        prop_assume!(base.nearest_within(target, tolerance).is_none());

        let marked = base
            .toggle_at(target, tolerance)
            .commit_type(ChangePointType::Level, 1.0)
            .unwrap();
        prop_assert_eq!(marked.len(), base.len() + 1);

        let restored = marked.toggle_at(target, tolerance);
        let before: Vec<usize> = base.annotations().map(|a| a.position).collect();
        let after: Vec<usize> = restored.annotations().map(|a| a.position).collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(restored.pending_selection(), None);
    }
}
