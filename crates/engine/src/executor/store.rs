//! Shared by-ref result store used by every executor backend: tracks each
//! ref's status/result/error and evicts the oldest *terminal* entries
//! once the store exceeds `capacity`, capping memory. In-flight
//! (non-terminal) entries are never evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use queue::resilience::ErrorCategory;

use crate::error::SpineError;
use crate::executor::RefStatus;

pub(super) struct Slot {
    pub status: RefStatus,
    pub result: Option<Value>,
    pub error: Option<(ErrorCategory, String)>,
}

pub(super) struct ResultStore {
    capacity: usize,
    slots: Mutex<(HashMap<Uuid, Slot>, VecDeque<Uuid>)>,
}

impl ResultStore {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, slots: Mutex::new((HashMap::new(), VecDeque::new())) }
    }

    pub fn insert_pending(&self, work_ref: Uuid) {
        let mut guard = self.slots.lock().unwrap();
        guard.0.insert(work_ref, Slot { status: RefStatus::Pending, result: None, error: None });
        guard.1.push_back(work_ref);
        Self::evict(&mut guard.0, &mut guard.1, self.capacity);
    }

    pub fn set_running(&self, work_ref: Uuid) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(slot) = guard.0.get_mut(&work_ref) {
            slot.status = RefStatus::Running;
        }
    }

    pub fn set_completed(&self, work_ref: Uuid, result: Value) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(slot) = guard.0.get_mut(&work_ref) {
            slot.status = RefStatus::Completed;
            slot.result = Some(result);
        }
        let (slots, order) = &mut *guard;
        Self::evict(slots, order, self.capacity);
    }

    pub fn set_failed(&self, work_ref: Uuid, error: &SpineError) {
        let mut guard = self.slots.lock().unwrap();
        if let Some(slot) = guard.0.get_mut(&work_ref) {
            slot.status = RefStatus::Failed;
            slot.error = Some((error.category(), error.to_string()));
        }
        let (slots, order) = &mut *guard;
        Self::evict(slots, order, self.capacity);
    }

    pub fn set_cancelled(&self, work_ref: Uuid) -> bool {
        let mut guard = self.slots.lock().unwrap();
        match guard.0.get_mut(&work_ref) {
            Some(slot) if !is_terminal(slot.status) => {
                slot.status = RefStatus::Cancelled;
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, work_ref: Uuid) -> RefStatus {
        self.slots
            .lock()
            .unwrap()
            .0
            .get(&work_ref)
            .map(|s| s.status)
            .unwrap_or(RefStatus::NotFound)
    }

    pub fn result(&self, work_ref: Uuid) -> Option<Value> {
        self.slots.lock().unwrap().0.get(&work_ref).and_then(|s| s.result.clone())
    }

    pub fn error(&self, work_ref: Uuid) -> Option<SpineError> {
        self.slots
            .lock()
            .unwrap()
            .0
            .get(&work_ref)
            .and_then(|s| s.error.clone())
            .map(|(category, message)| SpineError::from_category(category, message))
    }

    pub fn active_count(&self) -> usize {
        self.slots.lock().unwrap().0.values().filter(|s| !is_terminal(s.status)).count()
    }

    fn evict(slots: &mut HashMap<Uuid, Slot>, order: &mut VecDeque<Uuid>, capacity: usize) {
        while slots.len() > capacity {
            let Some(candidate) = order.iter().position(|r| slots.get(r).map(|s| is_terminal(s.status)).unwrap_or(true)) else {
                break;
            };
            let work_ref = order.remove(candidate).unwrap();
            slots.remove(&work_ref);
        }
    }
}

fn is_terminal(status: RefStatus) -> bool {
    matches!(status, RefStatus::Completed | RefStatus::Failed | RefStatus::Cancelled)
}
