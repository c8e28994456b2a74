//! Webhook relay inbound surface.
//!
//! Receives webhooks over HTTP, turns each request into a
//! [`routing::RawEvent`], and passes it through the [`InboundGate`], which
//! validates it, resolves its endpoints and hands it to the
//! [`dispatcher::Dispatcher`].
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`extract`] | Header and payload extraction for GitCode, GitHub, Gitee and GitLab |
//! | [`gate`] | [`InboundGate`]: admit, resolve, dispatch |
//! | [`server`] | axum router, handlers and the HTTP error mapping |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Only request parsing and response mapping live here;
//! validation rules belong to `routing` and delivery to `dispatcher`.

pub mod extract;
pub mod gate;
pub mod server;

pub use extract::{extract_event, DELIVERY_HEADERS, EVENT_TYPE_HEADERS, FIELD_DELIVERY};
pub use gate::{GateError, GateOutcome, InboundGate};
pub use server::{
    build_router, health_handler, webhook_handler, WebhookError, MAX_PAYLOAD_BYTES,
    SHUTTING_DOWN_MESSAGE,
};
