//! # trecur Core Library
//!
//! Chained and periodic recurrence for Taskwarrior, driven from its hooks.
//!
//! A series is a parent record carrying a period (`r`) and a type
//! (`rtype:chained` or `rtype:periodic`). Instances are plain records that
//! point back at the parent through `rparent`:
//!
//! - **Chained**: the next instance is due one period after the previous one
//!   was finished.
//! - **Periodic**: instances fall on a fixed grid anchored at the parent's due
//!   date, and any slots missed in the meantime are filled in.
//!
//! ## Core Modules
//!
//! - [`models`]: Task records and their Taskwarrior JSON form
//! - [`period`]: Duration parsing and calendar arithmetic
//! - [`datecalc`]: Date expressions such as `due - 3d`
//! - [`template`]: Copying records into new instances
//! - [`store`]: The [`store::TaskStore`] trait and its Taskwarrior and SQLite backends
//! - [`recurrence`]: Instance synthesis
//! - [`repair`]: Series maintenance
//! - [`timezone`]: Zone detection and local time resolution
//! - [`db`]: SQLite connection and migrations
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trecur_core::{
//!     models::Task,
//!     recurrence::{RecurrenceConfig, RecurrenceProcessor},
//!     store::SqliteStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::open("tasks.db".as_ref()).await?;
//!     let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::default());
//!
//!     let task = Task::from_json(
//!         r#"{"description":"Water the plants","due":"20370708T010000Z","r":"3d","rtype":"chained"}"#,
//!     )?;
//!     let parent = processor.add_recurrent_task(task).await?;
//!     println!("first instance: {:?}", parent.rlastinstance);
//!
//!     Ok(())
//! }
//! ```

pub mod datecalc;
pub mod db;
pub mod error;
pub mod models;
pub mod period;
pub mod recurrence;
pub mod repair;
pub mod store;
pub mod template;
pub mod timezone;
