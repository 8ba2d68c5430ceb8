use futures::executor::block_on;
use playpen::fetch::{FetchOutcome, fetch_ordered, fetch_outcomes};
use std::{cell::Cell, rc::Rc};

#[test]
fn results_follow_key_order() {
    let keys: Vec<u64> = (1..=8).collect();
    let items = block_on(fetch_ordered(keys, 3, |key| async move {
        Ok::<_, String>(key * 10)
    }));
    assert_eq!(items, vec![10, 20, 30, 40, 50, 60, 70, 80]);
}

#[test]
fn failures_are_dropped_from_ordered_results() {
    let items = block_on(fetch_ordered(vec![1, 2, 3, 4], 2, |key| async move {
        if key % 2 == 0 {
            Err(format!("key {key} failed"))
        } else {
            Ok(key)
        }
    }));
    assert_eq!(items, vec![1, 3]);
}

#[test]
fn outcomes_keep_failure_reasons() {
    let outcomes = block_on(fetch_outcomes(vec!["a", "", "c"], 4, |key| async move {
        if key.is_empty() {
            Err("empty key")
        } else {
            Ok(key.to_uppercase())
        }
    }));
    assert_eq!(
        outcomes,
        vec![
            FetchOutcome::Fetched {
                index: 0,
                item: "A".to_string()
            },
            FetchOutcome::Failed {
                index: 1,
                reason: "empty key".to_string()
            },
            FetchOutcome::Fetched {
                index: 2,
                item: "C".to_string()
            },
        ]
    );
}

#[test]
fn zero_workers_still_fetches_everything() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let items = block_on(fetch_ordered(vec![5, 6, 7], 0, move |key| {
        counter.set(counter.get() + 1);
        async move { Ok::<_, String>(key) }
    }));
    assert_eq!(items, vec![5, 6, 7]);
    assert_eq!(calls.get(), 3);
}

#[test]
fn empty_key_list_yields_nothing() {
    let items = block_on(fetch_ordered(Vec::<u8>::new(), 4, |key| async move {
        Ok::<_, String>(key)
    }));
    assert!(items.is_empty());
}
