//! Property tests for filter ordering within a phase.

use bytes::Bytes;
use http_body_util::Full;
use portico_filters::{BoxedFilter, FnFilter, Phase, PhaseExecutor, RequestContext};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

fn run_phase(orders: &[i32]) -> Vec<usize> {
    let ran = Arc::new(Mutex::new(Vec::new()));
    let filters: Vec<BoxedFilter> = orders
        .iter()
        .enumerate()
        .map(|(index, &order)| {
            let ran = Arc::clone(&ran);
            Arc::new(FnFilter::new(format!("f{index}"), Phase::Pre, order, move |_| {
                ran.lock().unwrap().push(index);
                Ok(())
            })) as BoxedFilter
        })
        .collect();

    let executor = PhaseExecutor::new(Phase::Pre, &filters);
    let mut ctx = RequestContext::new(
        http::Request::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(executor.execute(&mut ctx)).unwrap();

    let ran = ran.lock().unwrap().clone();
    ran
}

#[test]
fn test_documented_priorities() {
    // [10, -5, 0] runs as [-5, 0, 10]
    assert_eq!(run_phase(&[10, -5, 0]), vec![1, 2, 0]);
}

proptest! {
    #[test]
    fn test_filters_run_in_ascending_order(orders in prop::collection::vec(-50i32..50, 0..24)) {
        let ran = run_phase(&orders);
        prop_assert_eq!(ran.len(), orders.len());

        for pair in ran.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(orders[a] <= orders[b]);
            // Ties keep registration order
            if orders[a] == orders[b] {
                prop_assert!(a < b);
            }
        }
    }

    #[test]
    fn test_extreme_orders_are_respected(orders in prop::collection::vec(any::<i32>(), 1..12)) {
        let ran = run_phase(&orders);
        let mut expected: Vec<usize> = (0..orders.len()).collect();
        expected.sort_by_key(|&index| orders[index]);
        prop_assert_eq!(ran, expected);
    }
}
