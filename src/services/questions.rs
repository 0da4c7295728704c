//! Run-scoped question metadata cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::QuestionInfo;
use crate::services::transport::ContentTransport;

type Slot = Arc<Mutex<Option<QuestionInfo>>>;

/// Memoizes question detail by id. Failures are not cached.
///
/// Each id has its own slot: concurrent lookups of one question share a
/// single fetch, while other ids are served without waiting on it.
pub struct QuestionCache {
    transport: Arc<dyn ContentTransport>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl QuestionCache {
    pub fn new(transport: Arc<dyn ContentTransport>) -> Self {
        Self {
            transport,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cached detail, fetching once on a miss.
    pub async fn get(&self, question_id: &str) -> Option<QuestionInfo> {
        let slot = Arc::clone(
            self.slots
                .lock()
                .await
                .entry(question_id.to_string())
                .or_default(),
        );

        let mut entry = slot.lock().await;
        if let Some(hit) = entry.as_ref() {
            return Some(hit.clone());
        }

        match self.transport.fetch_question_detail(question_id).await {
            Ok(Some(info)) => {
                *entry = Some(info.clone());
                Some(info)
            }
            Ok(None) => {
                log::debug!("Question {question_id} has no detail");
                None
            }
            Err(e) => {
                log::warn!("Question {question_id} fetch failed: {e}");
                None
            }
        }
    }

    /// Number of questions cached so far.
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut cached = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                cached += 1;
            }
        }
        cached
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn test_hit_is_fetched_once() {
        let transport = Arc::new(FakeTransport::default());
        transport.add_question("q1", "Title");
        let cache = QuestionCache::new(transport.clone());

        assert_eq!(cache.get("q1").await.unwrap().title, "Title");
        assert_eq!(cache.get("q1").await.unwrap().title, "Title");
        assert_eq!(transport.question_calls("q1"), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_is_retried() {
        let transport = Arc::new(FakeTransport::default());
        transport.fail_question("q2");
        let cache = QuestionCache::new(transport.clone());

        assert!(cache.get("q2").await.is_none());
        assert!(cache.get("q2").await.is_none());
        assert_eq!(transport.question_calls("q2"), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_slow_fetch_does_not_block_other_ids() {
        let transport = Arc::new(FakeTransport::default());
        transport.add_question("slow", "Slow");
        transport.add_question("fast", "Fast");
        transport.set_question_latency("slow", 200);
        let cache = Arc::new(QuestionCache::new(transport.clone()));

        let first = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("slow").await }
        });
        let second = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("slow").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_millis(100), cache.get("fast"))
            .await
            .expect("lookup of another id waited on the slow fetch");
        assert_eq!(fast.unwrap().title, "Fast");

        assert_eq!(first.await.unwrap().unwrap().title, "Slow");
        assert_eq!(second.await.unwrap().unwrap().title, "Slow");
        assert_eq!(transport.question_calls("slow"), 1);
        assert_eq!(cache.len().await, 2);
    }
}
