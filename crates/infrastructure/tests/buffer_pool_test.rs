use dnsmux_infrastructure::dns::{BufferPool, MAX_MESSAGE_SIZE};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_holders_never_share_a_buffer() {
    let pool = BufferPool::with_max_idle(8);
    let live: Arc<Mutex<HashSet<usize>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let pool = pool.clone();
        let live = live.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..200 {
                let mut buffer = pool.acquire();
                let region = buffer.read_region();
                assert_eq!(region.len(), MAX_MESSAGE_SIZE);
                let key = region.as_ptr() as usize;

                assert!(live.lock().unwrap().insert(key), "buffer handed out twice");
                tokio::task::yield_now().await;
                assert!(live.lock().unwrap().remove(&key));
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let stats = pool.stats();
    assert!(stats.idle <= 8);
    assert_eq!(stats.total_created + stats.total_reused, 16 * 200);
}

#[test]
fn test_buffer_returns_on_every_path() {
    let pool = BufferPool::new();

    let result: Result<(), &str> = (|| {
        let _buffer = pool.acquire();
        Err("request failed")
    })();
    assert!(result.is_err());
    assert_eq!(pool.stats().idle, 1);

    let _held = pool.acquire();
    assert_eq!(pool.stats().idle, 0);
}
