use std::future::Future;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};

/// Drive a future to completion from synchronous code.
///
/// Inside a multi-threaded runtime the current worker is handed over with
/// `block_in_place`. A current-thread runtime can't be blocked, so the future
/// runs on a private runtime in a scoped thread instead. Outside any runtime a
/// private current-thread runtime is built on the spot.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| run_on_private_runtime(future))
                .join()
                .map_err(|_| std::io::Error::other("blocking task panicked"))?
        }),
        Err(_) => run_on_private_runtime(future),
    }
}

fn run_on_private_runtime<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn answer() -> u32 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        42
    }

    #[test]
    fn test_outside_runtime() {
        assert_eq!(block_on(answer()).unwrap(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inside_multi_thread_runtime() {
        assert_eq!(block_on(answer()).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_inside_current_thread_runtime() {
        assert_eq!(block_on(answer()).unwrap(), 42);
    }
}
