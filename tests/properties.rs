//! Property-based tests for sampling and label comparison.
//!
//! Uses proptest to verify invariants that must hold for all inputs:
//! - Subset size equals min(target, available)
//! - No class contributes more than it holds
//! - Sampling is deterministic for a seed
//! - The comparator is total, reflexive and symmetric

use complexity_eval::{compare, parse, sample, Dataset, Sample};
use proptest::prelude::*;

fn dataset_from_sizes(sizes: &[usize]) -> Dataset {
    let mut samples = Vec::new();
    for (class, size) in sizes.iter().enumerate() {
        for _ in 0..*size {
            let id = samples.len();
            samples.push(Sample {
                id,
                case: "case_2".to_string(),
                code_id: "CODE_1".to_string(),
                call_path: format!("main->f{id}"),
                function_name: format!("f{id}"),
                ground_truth: format!("class_{class}"),
                source_file: None,
                parameters: None,
            });
        }
    }
    Dataset::new(samples)
}

fn arb_label() -> impl Strategy<Value = String> {
    let factor = prop_oneof![
        (1_i64..5).prop_map(|e| format!("n^({e})")),
        (1_i64..5, 1_i64..5).prop_map(|(a, b)| format!("p^({a}/{b})")),
        Just("log2(p)".to_string()),
        Just("n".to_string()),
    ];
    prop::collection::vec(factor, 1..4).prop_map(|fs| fs.join(" * "))
}

proptest! {
    #[test]
    fn prop_subset_size_is_min_of_target_and_available(
        sizes in prop::collection::vec(1_usize..40, 1..12),
        target in 1_usize..300,
        seed in any::<u64>(),
    ) {
        let dataset = dataset_from_sizes(&sizes);
        let subset = sample(&dataset, target, seed).unwrap();
        let available: usize = sizes.iter().sum();

        prop_assert!(subset.total() <= target);
        prop_assert_eq!(subset.total(), target.min(available));
        prop_assert_eq!(subset.shortfall, target > available);
    }

    #[test]
    fn prop_no_class_exceeds_availability(
        sizes in prop::collection::vec(1_usize..40, 1..12),
        target in 1_usize..300,
    ) {
        let dataset = dataset_from_sizes(&sizes);
        let subset = sample(&dataset, target, 42).unwrap();
        for (class, size) in sizes.iter().enumerate() {
            let label = format!("class_{class}");
            prop_assert!(subset.count(&label) <= *size);
        }
    }

    #[test]
    fn prop_sampling_is_deterministic(
        sizes in prop::collection::vec(1_usize..30, 1..8),
        target in 1_usize..100,
        seed in any::<u64>(),
    ) {
        let dataset = dataset_from_sizes(&sizes);
        let first = sample(&dataset, target, seed).unwrap();
        let second = sample(&dataset, target, seed).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_compare_never_panics(a in ".{0,40}", b in ".{0,40}") {
        let _ = compare(&a, &b);
    }

    #[test]
    fn prop_compare_reflexive_for_valid_labels(label in arb_label()) {
        prop_assert!(compare(&label, &label));
    }

    #[test]
    fn prop_canonical_display_reparses(label in arb_label()) {
        let canonical = parse(&label).unwrap().to_string();
        prop_assert!(compare(&canonical, &label));
    }

    #[test]
    fn prop_compare_symmetric(a in arb_label(), b in arb_label()) {
        prop_assert_eq!(compare(&a, &b), compare(&b, &a));
    }
}
