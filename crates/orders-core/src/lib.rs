//! Core of the two-phase order service.
//!
//! An order is written and staged by the submission path, then made visible
//! or discarded by a later, unrelated confirmation naming the same
//! transaction token. The store's prepared-transaction registry is the only
//! link between the two; nothing in this crate remembers a token between
//! calls.

use orders_config::Config;
use std::sync::Arc;

pub mod builder;
pub mod confirmation;
pub mod repository;
pub mod submission;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{BuilderError, OrdersBuilder, OrdersFactories};
pub use confirmation::{ConfirmationError, ConfirmationService};
pub use repository::{OrderRepository, RepositoryError};
pub use submission::{SubmissionError, SubmissionService};

/// The assembled services sharing one repository.
pub struct OrdersEngine {
	config: Config,
	repository: Arc<OrderRepository>,
	submission: SubmissionService,
	confirmation: ConfirmationService,
}

impl OrdersEngine {
	pub fn new(
		config: Config,
		repository: Arc<OrderRepository>,
		submission: SubmissionService,
		confirmation: ConfirmationService,
	) -> Self {
		Self {
			config,
			repository,
			submission,
			confirmation,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Read access for the order lookup path.
	pub fn repository(&self) -> &Arc<OrderRepository> {
		&self.repository
	}

	pub fn submission(&self) -> &SubmissionService {
		&self.submission
	}

	pub fn confirmation(&self) -> &ConfirmationService {
		&self.confirmation
	}
}
