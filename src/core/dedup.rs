use parking_lot::Mutex;
use std::collections::HashSet;

/// 單次執行中已輸出的遠端 identity
///
/// 不持久化，每次執行都從空集合開始。`mark` 是唯一的檢查並標記點，
/// 並行的 worker 不會同時取得同一個 identity
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, identity: &str) -> bool {
        self.seen.lock().contains(identity)
    }

    /// identity 已被標記過時回傳 `false`
    pub fn mark(&self, identity: &str) -> bool {
        self.seen.lock().insert(identity.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
