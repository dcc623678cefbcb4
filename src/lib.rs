//! Core of the radial scope diagram editor.
//!
//! A [`Diagram`] holds swimlanes radiating from a center, outcomes placed
//! along them and scope blobs grouping outcomes across swimlanes. Edits go
//! through reversible [`Command`]s on a [`CommandStack`], and a [`Session`]
//! ties one document to its history and pointer handling.

pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod ids;
pub mod interaction;
pub mod model;
pub mod session;

pub use command::{Change, Command, Entity, Move};
pub use config::{BlobShape, Config};
pub use document::Document;
pub use error::{EntityKind, Error, Result};
pub use geometry::{Point, Rect};
pub use history::{CommandStack, StackStep};
pub use ids::{BlobId, IdGenerator, OutcomeId, SwimlaneId};
pub use interaction::{Key, Mode, Modifiers};
pub use model::{
    BlobAnchors, Diagram, EntityRef, Outcome, Placement, RemovedSubgraph, Rgba, ScopeBlob,
    Swimlane,
};
pub use session::Session;
