//! Folds rewritten by the pipeline must produce the terminal accumulator
//! the upstream code intended.
//!
//! The intended result is the input evaluated with leaky scoping, where a
//! rebinding inside a closure or branch updates the outer variable. The
//! rewritten tree is evaluated with the target language's strict scoping.

use exnorm_test_helpers::eval::{Evaluator, Scoping, Value};
use exnorm_test_helpers::fixtures::{contains_each, fold_fixtures};
use exnorm_test_helpers::normalize::{normalize, normalize_only};

const SIZES: [i64; 4] = [0, 1, 5, 100];

fn items(n: i64) -> Value {
    Value::ints(1..=n)
}

fn run(def: &exnorm_core::Node, scoping: Scoping, n: i64) -> Value {
    Evaluator::new(scoping)
        .call_def(def, vec![items(n)])
        .unwrap_or_else(|e| panic!("evaluation failed: {}\n{:?}", e, def))
}

#[test]
fn test_threaded_folds_preserve_terminal_accumulator() {
    for fixture in fold_fixtures() {
        let rewritten = normalize_only(fixture.def.clone(), &["accumulator-threading"]).unwrap();
        for n in SIZES {
            let intended = run(&fixture.def, Scoping::Leaky, n);
            let actual = run(&rewritten, Scoping::Strict, n);
            assert_eq!(actual, intended, "{} with {} items", fixture.name, n);
        }
    }
}

#[test]
fn test_full_pipeline_preserves_terminal_accumulator() {
    for fixture in fold_fixtures() {
        let rewritten = normalize(fixture.def.clone()).unwrap();
        for n in SIZES {
            let intended = run(&fixture.def, Scoping::Leaky, n);
            let actual = run(&rewritten, Scoping::Strict, n);
            assert_eq!(
                actual, intended,
                "{} with {} items:\n{:?}",
                fixture.name, n, rewritten
            );
        }
    }
}

#[test]
fn test_fixtures_are_broken_before_rewriting() {
    // Otherwise the soundness checks above would pass vacuously.
    let broken: Vec<&str> = fold_fixtures()
        .iter()
        .filter(|f| run(&f.def, Scoping::Strict, 5) != run(&f.def, Scoping::Leaky, 5))
        .map(|f| f.name)
        .collect();
    for name in [
        "each-sum",
        "each-conditional-count",
        "each-append",
        "reduce-branch-rebind",
        "reduce-while-branch-rebind",
        "reduce-while-halting",
    ] {
        assert!(broken.contains(&name), "{} evaluates the same under both scopings", name);
    }
}

#[test]
fn test_each_loops_are_gone_after_threading() {
    for fixture in fold_fixtures() {
        let rewritten = normalize_only(fixture.def, &["accumulator-threading"]).unwrap();
        assert!(!contains_each(&rewritten), "{} kept Enum.each", fixture.name);
    }
}

#[test]
fn test_threading_is_idempotent_on_fixtures() {
    for fixture in fold_fixtures() {
        let once = normalize_only(fixture.def, &["accumulator-threading"]).unwrap();
        let twice = normalize_only(once.clone(), &["accumulator-threading"]).unwrap();
        assert_eq!(once, twice, "{}", fixture.name);
    }
}
