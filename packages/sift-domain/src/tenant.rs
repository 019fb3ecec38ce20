use serde::{Deserialize, Serialize};

/// The tenant owning shared/system-wide rows.
pub const GLOBAL_TENANT_ID: &str = "@";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
	pub tenant_id: String,
}
impl TenantContext {
	pub fn new(tenant_id: impl Into<String>) -> Self {
		Self { tenant_id: tenant_id.into() }
	}

	pub fn is_global(&self) -> bool {
		self.tenant_id == GLOBAL_TENANT_ID
	}
}

/// Per-entity-type isolation policy, fixed at registration time and consulted
/// on every query, count, and generic-key lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPolicy {
	pub isolated: bool,
	/// A regular tenant may additionally read the global tenant's rows.
	pub me_or_global: bool,
	/// The global tenant may read every tenant's rows.
	pub global_can_access_all: bool,
}
impl TenantPolicy {
	pub const fn shared() -> Self {
		Self { isolated: false, me_or_global: false, global_can_access_all: false }
	}

	pub const fn isolated() -> Self {
		Self { isolated: true, me_or_global: false, global_can_access_all: false }
	}

	/// Derives the row-visibility restriction both backend adapters translate
	/// into their native predicate.
	pub fn restriction(&self, caller: &TenantContext) -> TenantRestriction {
		if !self.isolated {
			return TenantRestriction::None;
		}
		if caller.is_global() {
			if self.global_can_access_all {
				return TenantRestriction::None;
			}

			return TenantRestriction::Only(GLOBAL_TENANT_ID.to_string());
		}
		if self.me_or_global {
			return TenantRestriction::MeOrGlobal {
				me: caller.tenant_id.clone(),
				global: GLOBAL_TENANT_ID.to_string(),
			};
		}

		TenantRestriction::Only(caller.tenant_id.clone())
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TenantRestriction {
	None,
	Only(String),
	MeOrGlobal { me: String, global: String },
}
