mod common;

use std::collections::HashSet;
use std::sync::Mutex;

use blake3::hash;
use common::{reference, simulated_reads};
use locuswalk::genomics::{GenomicInterval, InMemoryAlignments, LocusUnit, ReadUnit, ReferenceSource};
use locuswalk::walker::{FoldReducer, MapFn, Walker};
use locuswalk::walkers;
use locuswalk::{TraversalConfig, TraversalEngine};
use proptest::prelude::*;
use test_case::test_case;

fn run_all(config: TraversalConfig, reads: &InMemoryAlignments) -> String {
    let reference = reference();
    let mut engine = TraversalEngine::new(&reference, config);
    let quality = engine
        .run(reads, &mut walkers::quality_histogram())
        .expect("quality traversal");
    let depth = engine
        .run(reads, &mut walkers::depth_of_coverage())
        .expect("depth traversal");
    let indels = engine
        .run(reads, &mut walkers::indel_counter())
        .expect("indel traversal");
    let mismatches = engine
        .run(reads, &mut walkers::mismatch_counter())
        .expect("mismatch traversal");

    format!(
        "{}--\n{}{}--\n{:?}\n--\n{:?}\nvisited {} {} {} {}\n",
        quality.output,
        depth.output.depths,
        depth.output.total_depth,
        indels.output,
        mismatches.output,
        quality.summary.units_visited,
        depth.summary.units_visited,
        indels.summary.units_visited,
        mismatches.summary.units_visited,
    )
}

#[test_case(1 ; "single shard")]
#[test_case(2 ; "two shards")]
#[test_case(5 ; "five shards")]
fn sharded_results_match_sequential(shards: usize) {
    let reference = reference();
    let reads = InMemoryAlignments::new(simulated_reads(&reference, 80, 17));

    let sequential = run_all(TraversalConfig::sequential(), &reads);
    let sharded = run_all(TraversalConfig::parallel(shards), &reads);
    assert_eq!(sequential, sharded);
}

#[test_case(2 ; "two shards")]
#[test_case(7 ; "seven shards")]
fn sharded_intervals_match_sequential(shards: usize) {
    let reference = reference();
    let reads = InMemoryAlignments::new(simulated_reads(&reference, 60, 23));
    let intervals = vec![
        GenomicInterval::new("chr1", 10, 35),
        GenomicInterval::new("chr2", 1, 12),
        GenomicInterval::new("chr1", 30, 50),
    ];

    let sequential = run_all(TraversalConfig::sequential().with_intervals(intervals.clone()), &reads);
    let sharded = run_all(TraversalConfig::parallel(shards).with_intervals(intervals), &reads);
    assert_eq!(sequential, sharded);
}

#[test]
fn combine_preserves_coordinate_order() {
    let reference = reference();
    let reads = InMemoryAlignments::new(simulated_reads(&reference, 50, 31));
    let walker = || {
        Walker::new(
            "trail",
            MapFn::new(|unit: &LocusUnit| Ok(format!("{};", unit.locus()))),
            FoldReducer::new(String::new, |step: String, mut trail: String| {
                trail.push_str(&step);
                Ok(trail)
            })
            .with_combine(|mut left: String, right: String| {
                left.push_str(&right);
                Ok(left)
            }),
        )
    };

    let mut engine = TraversalEngine::new(&reference, TraversalConfig::sequential());
    let sequential = engine.run(&reads, &mut walker()).expect("sequential").output;
    let mut engine = TraversalEngine::new(&reference, TraversalConfig::parallel(6));
    let outcome = engine.run(&reads, &mut walker()).expect("sharded");
    assert_eq!(outcome.summary.shards, 6);
    assert_eq!(sequential, outcome.output);
}

#[test]
fn repeated_runs_are_deterministic() {
    let reference = reference();
    let reads = InMemoryAlignments::new(simulated_reads(&reference, 64, 99));

    let mut fingerprints = HashSet::new();
    for shards in [1, 3, 4] {
        for _ in 0..3 {
            let rendered = run_all(TraversalConfig::parallel(shards), &reads);
            fingerprints.insert(hash(rendered.as_bytes()));
        }
    }
    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}

proptest! {
    #[test]
    fn units_arrive_in_coordinate_order(seed in 1u64..10_000, count in 1usize..40) {
        let reference = reference();
        let reads = InMemoryAlignments::new(simulated_reads(&reference, count, seed));
        let contig_index = |name: &str| reference.contig_index(name).expect("known contig");

        let order = Mutex::new(Vec::new());
        let mut loci = Walker::new(
            "loci",
            MapFn::new(|unit: &LocusUnit| {
                order.lock().unwrap().push((contig_index(unit.locus().contig.as_ref()), unit.locus().position));
                Ok(())
            }),
            FoldReducer::new(|| (), |_: (), _: ()| Ok(())),
        );
        let mut engine = TraversalEngine::new(&reference, TraversalConfig::sequential());
        engine.run(&reads, &mut loci).expect("locus traversal");
        drop(loci);
        let visited = order.into_inner().unwrap();
        prop_assert!(visited.windows(2).all(|w| w[0] < w[1]), "loci strictly increase");

        let starts = Mutex::new(Vec::new());
        let mut by_read = Walker::new(
            "reads",
            MapFn::new(|unit: &ReadUnit| {
                starts.lock().unwrap().push((contig_index(unit.read.contig.as_ref()), unit.read.start));
                Ok(())
            }),
            FoldReducer::new(|| (), |_: (), _: ()| Ok(())),
        );
        engine.run(&reads, &mut by_read).expect("read traversal");
        drop(by_read);
        let starts = starts.into_inner().unwrap();
        prop_assert_eq!(starts.len(), count);
        prop_assert!(starts.windows(2).all(|w| w[0] <= w[1]), "read starts never decrease");
    }
}
