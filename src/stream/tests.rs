use super::*;
use crate::failure::Failure;
use std::sync::atomic::{AtomicUsize, Ordering};

fn results<T, E>(emissions: Vec<Emission<T, E>>) -> Vec<Result<T, E>> {
    emissions.into_iter().map(Emission::into_result).collect()
}

// Constructors
#[tokio::test]
async fn test_constant_single_emission() {
    let emissions = Stream::<_, String, ()>::constant(5).collect(&(), None).await;
    assert_eq!(emissions, vec![Emission::success(5, Progress::single())]);
}

#[tokio::test]
async fn test_never_single_failure() {
    let emissions = Stream::<i32, _, ()>::never("down").collect(&(), None).await;
    assert_eq!(emissions, vec![Emission::failure("down", Progress::single())]);
}

#[tokio::test]
async fn test_failure_does_not_end_stream() {
    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 3)),
        Emission::failure("bad", Progress::new(2, 3)),
        Emission::success(3, Progress::new(3, 3)),
    ]);

    let emissions = stream.collect(&(), None).await;
    assert_eq!(emissions.len(), 3);
    assert!(emissions[1].is_failure());
    assert_eq!(emissions[2].result, Ok(3));
}

#[tokio::test]
async fn test_create_is_lazy() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let stream = Stream::<_, String, ()>::create(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        futures::stream::iter(vec![Emission::success(1, Progress::none())]).boxed()
    })
    .map(|x| x * 2);

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(results(stream.collect(&(), None).await), vec![Ok(2)]);
    assert_eq!(results(stream.collect(&(), None).await), vec![Ok(2)]);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

// Channel producers
#[tokio::test]
async fn test_channel_preserves_order() {
    let stream = Stream::<u64, String, ()>::channel(|_, _, mut emitter| {
        Box::pin(async move {
            for n in 1..=4 {
                if emitter.success(n, Progress::new(n, 4)).await.is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
    });

    let emissions = stream.collect(&(), None).await;
    let values: Vec<_> = emissions.iter().map(|e| e.progress.current).collect();
    assert_eq!(values, vec![Some(1), Some(2), Some(3), Some(4)]);
    assert_eq!(results(emissions), vec![Ok(1), Ok(2), Ok(3), Ok(4)]);
}

#[tokio::test]
async fn test_channel_reads_caps() {
    struct Source {
        items: Vec<&'static str>,
    }

    let stream = Stream::<&'static str, String, Source>::channel(|source, _, mut emitter| {
        Box::pin(async move {
            for item in &source.items {
                if emitter.success(*item, Progress::none()).await.is_err() {
                    return;
                }
            }
        })
    });

    let source = Source {
        items: vec!["a", "b"],
    };
    assert_eq!(
        results(stream.collect(&source, None).await),
        vec![Ok("a"), Ok("b")]
    );
}

#[tokio::test]
async fn test_channel_producer_stops_when_consumer_drops() {
    let sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sent);

    let stream = Stream::<usize, String, ()>::channel(move |_, _, mut emitter| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            for n in 0..100 {
                if emitter.success(n, Progress::none()).await.is_err() {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    });

    let first_two: Vec<_> = stream.run(&(), None).take(2).collect().await;
    assert_eq!(results(first_two), vec![Ok(0), Ok(1)]);
    assert!(sent.load(Ordering::SeqCst) < 100);
}

// Per-emission combinators
#[tokio::test]
async fn test_map_keeps_progress_and_failures() {
    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 2)),
        Emission::failure("e", Progress::new(2, 2)),
    ])
    .map(|x| x * 10);

    let emissions = stream.collect(&(), None).await;
    assert_eq!(
        emissions,
        vec![
            Emission::success(10, Progress::new(1, 2)),
            Emission::failure("e", Progress::new(2, 2)),
        ]
    );
}

#[tokio::test]
async fn test_map_err_keeps_progress() {
    let stream = Stream::<i32, _, ()>::from_emissions(vec![Emission::failure(
        7,
        Progress::at(4),
    )])
    .map_err(|code| format!("code {}", code));

    let emissions = stream.collect(&(), None).await;
    assert_eq!(
        emissions,
        vec![Emission::failure("code 7".to_string(), Progress::at(4))]
    );
}

#[tokio::test]
async fn test_or_else_map_converts_in_place() {
    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 3)),
        Emission::failure("xx", Progress::new(2, 3)),
        Emission::success(3, Progress::new(3, 3)),
    ])
    .or_else_map(|e| e.len() as i32);

    let emissions = stream.collect(&(), None).await;
    assert_eq!(
        emissions,
        vec![
            Emission::success(1, Progress::new(1, 3)),
            Emission::success(2, Progress::new(2, 3)),
            Emission::success(3, Progress::new(3, 3)),
        ]
    );
}

// Splicing combinators
#[tokio::test]
async fn test_flat_map_drains_each_substream_in_order() {
    let stream = Stream::<_, String, ()>::from_emissions(vec![
        Emission::success(1, Progress::none()),
        Emission::success(2, Progress::none()),
    ])
    .flat_map(|n| {
        Stream::from_emissions(vec![
            Emission::success(format!("{}a", n), Progress::none()),
            Emission::success(format!("{}b", n), Progress::none()),
        ])
    });

    let values = results(stream.collect(&(), None).await);
    assert_eq!(
        values,
        vec![
            Ok("1a".to_string()),
            Ok("1b".to_string()),
            Ok("2a".to_string()),
            Ok("2b".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_flat_map_stops_at_first_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 3)),
        Emission::failure("broken", Progress::new(2, 3)),
        Emission::success(3, Progress::new(3, 3)),
    ])
    .flat_map(move |n| {
        counter.fetch_add(1, Ordering::SeqCst);
        Stream::constant(n * 100)
    });

    let emissions = stream.collect(&(), None).await;
    assert_eq!(
        emissions,
        vec![
            Emission::success(100, Progress::single()),
            Emission::failure("broken", Progress::new(2, 3)),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_flat_map_passes_substream_failures() {
    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::none()),
        Emission::success(2, Progress::none()),
    ])
    .flat_map(|n| {
        Stream::from_emissions(vec![
            Emission::failure(Failure::retryable(format!("try {}", n)), Progress::at(1)),
            Emission::success(n, Progress::at(2)),
        ])
    });

    let emissions = stream.collect(&(), None).await;
    assert_eq!(emissions.len(), 4);
    assert_eq!(emissions[3].result, Ok(2));
}

#[tokio::test]
async fn test_or_else_splices_recovery() {
    let stream = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 3)),
        Emission::failure("fail", Progress::new(2, 3)),
        Emission::success(3, Progress::new(3, 3)),
    ])
    .or_else(|_| {
        Stream::<_, String, ()>::from_emissions(vec![
            Emission::success(10, Progress::none()),
            Emission::success(11, Progress::none()),
        ])
    });

    let values = results(stream.collect(&(), None).await);
    assert_eq!(values, vec![Ok(1), Ok(10), Ok(11)]);
}

#[tokio::test]
async fn test_or_else_without_failure_passes_through() {
    let stream = Stream::<_, &str, ()>::from_emissions(vec![
        Emission::success(1, Progress::new(1, 2)),
        Emission::success(2, Progress::new(2, 2)),
    ])
    .or_else(|_| Stream::<_, String, ()>::constant(0));

    let emissions = stream.collect(&(), None).await;
    assert_eq!(
        emissions,
        vec![
            Emission::success(1, Progress::new(1, 2)),
            Emission::success(2, Progress::new(2, 2)),
        ]
    );
}

#[tokio::test]
async fn test_with_caps_projects() {
    struct Inner {
        value: i32,
    }

    struct Outer {
        inner: Inner,
    }

    let stream = Stream::<i32, String, Inner>::channel(|inner, _, mut emitter| {
        Box::pin(async move {
            let _ = emitter.success(inner.value, Progress::none()).await;
        })
    })
    .with_caps(|outer: &Outer| &outer.inner);

    let caps = Outer {
        inner: Inner { value: 4 },
    };
    assert_eq!(results(stream.collect(&caps, None).await), vec![Ok(4)]);
}

// Conversion back to a task
#[tokio::test]
async fn test_to_task_takes_last_emission() {
    let task = Stream::<_, _, ()>::from_emissions(vec![
        Emission::failure("first", Progress::new(1, 3)),
        Emission::failure("second", Progress::new(2, 3)),
        Emission::success(3, Progress::new(3, 3)),
    ])
    .to_task();

    assert_eq!(task.run(&(), None).await, Ok(3));
}

#[tokio::test]
async fn test_to_task_last_failure_wins() {
    let task = Stream::<_, _, ()>::from_emissions(vec![
        Emission::success(1, Progress::none()),
        Emission::failure("final", Progress::none()),
    ])
    .to_task();

    assert_eq!(task.run(&(), None).await, Err("final"));
}

#[tokio::test]
#[should_panic(expected = "stream completed without emitting a result")]
async fn test_to_task_panics_on_empty_stream() {
    let task = Stream::<i32, String, ()>::from_emissions(Vec::new()).to_task();
    let _ = task.run(&(), None).await;
}

#[tokio::test]
async fn test_widen_err() {
    let stream = Stream::<_, _, ()>::never("e")
        .or_else_map(|_| 1)
        .widen_err::<Failure>()
        .flat_map(|x| Stream::constant(x + 1));

    assert_eq!(results(stream.collect(&(), None).await), vec![Ok(2)]);
}

#[test]
fn test_debug_hides_function() {
    let stream = Stream::<_, String, ()>::constant(1);
    assert_eq!(format!("{:?}", stream), "Stream { init: \"<function>\" }");
}
