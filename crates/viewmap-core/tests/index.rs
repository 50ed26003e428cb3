//! Combined section index invariants.

use proptest::prelude::*;

use viewmap_core::{CombinedSectionIndex, IndexError, MappingDescriptor};
use viewmap_model::{Coordinate, GroupPath, MappingId, VersionToken};

fn descriptor(name: &str, counts: &[usize]) -> MappingDescriptor {
    let groups: Vec<(String, usize)> = counts
        .iter()
        .enumerate()
        .map(|(g, &rows)| (format!("{name}-{g}"), rows))
        .collect();
    let groups: Vec<(&str, usize)> = groups.iter().map(|(n, r)| (n.as_str(), *r)).collect();
    MappingDescriptor::from_counts(
        MappingId::new(name).expect("valid id"),
        VersionToken::new(1),
        &groups,
    )
}

fn id(name: &str) -> MappingId {
    MappingId::new(name).expect("valid id")
}

#[test]
fn three_descriptors_lay_out_end_to_end() {
    let mappings = vec![
        descriptor("first", &[4, 4]),
        descriptor("second", &[1]),
        descriptor("third", &[5, 5, 5]),
    ];
    let index = CombinedSectionIndex::rebuild(&mappings).expect("index");
    assert_eq!(index.total_sections(), 6);
    assert_eq!(index.section_range(&id("first")), Some(0..2));
    assert_eq!(index.section_range(&id("second")), Some(2..3));
    assert_eq!(index.section_range(&id("third")), Some(3..6));
    assert_eq!(
        index.flat_coordinate(&id("third"), GroupPath::new(0, 3)),
        Ok(Coordinate::new(3, 3))
    );
    assert_eq!(
        index.flat_coordinate(&id("third"), GroupPath::new(1, 3)),
        Ok(Coordinate::new(4, 3))
    );

    let without_second = vec![mappings[0].clone(), mappings[2].clone()];
    let index = CombinedSectionIndex::rebuild(&without_second).expect("index");
    assert_eq!(index.section_range(&id("third")), Some(2..5));
    assert_eq!(
        index.flat_coordinate(&id("third"), GroupPath::new(0, 3)),
        Ok(Coordinate::new(2, 3))
    );
}

#[test]
fn lookups_outside_the_index_fail() {
    let index = CombinedSectionIndex::rebuild(&[descriptor("only", &[2, 3])]).expect("index");
    assert_eq!(
        index.flat_section(&id("only"), 2),
        Err(IndexError::NotFound {
            mapping: id("only"),
            section: 2
        })
    );
    assert_eq!(
        index.flat_section(&id("missing"), 0),
        Err(IndexError::NotFound {
            mapping: id("missing"),
            section: 0
        })
    );
    assert_eq!(
        index.local_section(2),
        Err(IndexError::OutOfRange {
            section: 2,
            total: 2
        })
    );
}

#[test]
fn row_counts_follow_descriptor_order() {
    let index = CombinedSectionIndex::rebuild(&[descriptor("b", &[7]), descriptor("a", &[1, 2])])
        .expect("index");
    assert_eq!(index.row_counts(), &[7, 1, 2]);
    assert_eq!(index.rows_in_section(2), Some(2));
    assert_eq!(index.rows_in_section(3), None);
}

#[derive(Debug, Clone)]
enum ListMutation {
    Insert { at: usize, groups: Vec<usize> },
    Remove { at: usize },
}

fn mutation() -> impl Strategy<Value = ListMutation> {
    prop_oneof![
        (0usize..8, prop::collection::vec(0usize..6, 0..4))
            .prop_map(|(at, groups)| ListMutation::Insert { at, groups }),
        (0usize..8).prop_map(|at| ListMutation::Remove { at }),
    ]
}

fn assert_covering(index: &CombinedSectionIndex) -> Result<(), TestCaseError> {
    prop_assert!(index.is_consistent());
    let mut next = 0;
    for range in index.ranges() {
        prop_assert_eq!(range.start, next);
        next = range.end();
    }
    prop_assert_eq!(next, index.total_sections());
    Ok(())
}

proptest! {
    #[test]
    fn ranges_stay_contiguous_under_mutation(mutations in prop::collection::vec(mutation(), 1..24)) {
        let mut mappings: Vec<MappingDescriptor> = Vec::new();
        for (step, mutation) in mutations.into_iter().enumerate() {
            match mutation {
                ListMutation::Insert { at, groups } => {
                    let at = at.min(mappings.len());
                    mappings.insert(at, descriptor(&format!("m{step}"), &groups));
                }
                ListMutation::Remove { at } => {
                    if !mappings.is_empty() {
                        mappings.remove(at % mappings.len());
                    }
                }
            }
            let index = CombinedSectionIndex::rebuild(&mappings).expect("unique ids");
            assert_covering(&index)?;
            let groups: usize = mappings.iter().map(MappingDescriptor::number_of_groups).sum();
            prop_assert_eq!(index.total_sections(), groups);
        }
    }

    #[test]
    fn flat_and_local_sections_round_trip(
        layout in prop::collection::vec(prop::collection::vec(0usize..5, 0..5), 0..8)
    ) {
        let mappings: Vec<MappingDescriptor> = layout
            .iter()
            .enumerate()
            .map(|(slot, groups)| descriptor(&format!("m{slot}"), groups))
            .collect();
        let index = CombinedSectionIndex::rebuild(&mappings).expect("unique ids");
        for flat in 0..index.total_sections() {
            let (mapping, local) = index.local_section(flat).expect("in range");
            prop_assert_eq!(index.flat_section(mapping, local), Ok(flat));
        }
    }
}
