//! Mastodon API Client Core
//!
//! The non-mechanical part of a Mastodon-style API client: turning
//! response bytes into types.
//!
//! - [`decode`] / [`decode_list`]: decode a response body, or fail with
//!   the server's `{"error": ...}` object as a typed [`ApiError`].
//! - [`parse_link_header`] and [`Page`]: cursor pagination from the `Link`
//!   header.
//! - [`consume_stream`] and [`EventStream`]: the streaming API as an async
//!   sequence of [`DomainEvent`]s, with cancellation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use mastodon_stream::{CancelSignal, Client, DomainEvent, Range, Status};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("mastodon.social", "ACCESS_TOKEN")?;
//!
//!     // One page of the home timeline, then the next one
//!     let page = client
//!         .get_page::<Status>("/api/v1/timelines/home", &Range::new().limit(20))
//!         .await?;
//!     if let Some(next) = page.next_range(Some(20)) {
//!         let older = client.get_page::<Status>("/api/v1/timelines/home", &next).await?;
//!         println!("{} older statuses", older.len());
//!     }
//!
//!     // Follow the public timeline
//!     let cancel = CancelSignal::new();
//!     let mut events = client.public_stream(false, cancel.clone()).await?;
//!     while let Some(event) = events.next().await {
//!         match event? {
//!             DomainEvent::Update(status) => println!("{}: {}", status.account.acct, status.content),
//!             DomainEvent::Notification(n) => println!("notification {}", n.id),
//!             DomainEvent::Delete(id) => println!("deleted {}", id),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod decode;
mod entities;
mod error;
mod link;
mod page;
mod sse;
mod types;

pub use client::{Client, ClientBuilder};
pub use decode::{decode, decode_list, Entity};
pub use entities::{
    Account, Application, Attachment, Card, Context, Empty, Instance, Mention, Notification,
    RegisteredApp, Relationship, Report, Results, Status, Tag, TokenInfo,
};
pub use error::{
    ApiError, ClientError, DecodeError, InvalidHeaderError, LinkHeaderError, StreamError,
};
pub use link::{parse_link_header, PageCursor};
pub use page::{Page, Range, DEFAULT_LIMIT};
pub use sse::{
    consume_stream, consume_stream_with_buffer, CancelSignal, Demultiplexer, DomainEvent,
    EventKind, EventStream, StreamEnd, DEFAULT_STREAM_BUFFER,
};
pub use types::{AttachmentType, NotificationType, Scope, SerializeOptions, Visibility};
