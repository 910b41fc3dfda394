use axum::http::StatusCode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters, readable through the admin API.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    orders_created: AtomicU64,
    login_failures: AtomicU64,
    chatbot_messages: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub orders_created: u64,
    pub login_failures: u64,
    pub chatbot_messages: u64,
}

impl Metrics {
    pub fn record_response(&self, status: StatusCode) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn order_created(&self) {
        self.orders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chatbot_message(&self) {
        self.chatbot_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            orders_created: self.orders_created.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            chatbot_messages: self.chatbot_messages.load(Ordering::Relaxed),
        }
    }
}
