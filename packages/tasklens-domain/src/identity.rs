use std::fmt;

use uuid::Uuid;

/// A user id that an authentication collaborator has already verified.
///
/// Nothing in this workspace authenticates users; the type only marks ids that arrived through a
/// trusted channel so they are never confused with ids a client typed into a request body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallerIdentity {
	user_id: Uuid,
}
impl CallerIdentity {
	/// Returns `None` for the nil id, which no real account carries.
	pub fn verified(user_id: Uuid) -> Option<Self> {
		if user_id.is_nil() {
			return None;
		}

		Some(Self { user_id })
	}

	pub fn user_id(&self) -> Uuid {
		self.user_id
	}
}
impl fmt::Display for CallerIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.user_id.fmt(f)
	}
}
