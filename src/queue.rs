use async_trait::async_trait;

/// An asynchronous operation applied to each item of a work list
#[async_trait]
pub trait Task<T: Send + 'static>: Send {
    type Output: Send;
    type Error: Send;

    /// Process one item; failures the task can live with belong in `Output`
    async fn run(&mut self, item: T) -> Result<Self::Output, Self::Error>;
}

/// Runs `task` over `items` one at a time, in order
///
/// The next item is not started before the previous one has settled. The
/// first error stops the sequence and is returned; otherwise the outputs
/// come back in input order.
pub async fn enqueue<T, K>(
    items: impl IntoIterator<Item = T>,
    task: &mut K,
) -> Result<Vec<K::Output>, K::Error>
where
    T: Send + 'static,
    K: Task<T> + ?Sized,
{
    let mut outputs = Vec::new();
    for item in items {
        outputs.push(task.run(item).await?);
    }
    Ok(outputs)
}
