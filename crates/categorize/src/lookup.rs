//! Name -> entity resolution with structured error codes.
//!
//! Failures never abort a batch: they come back as a [`CategorizationError`]
//! that the caller stores on the transaction.

use budgnudg_core::{
    normalize_name, CategorizationError, Category, EntityResolver, LookupTarget, Payoree,
    ResolverError,
};
use tracing::warn;

use crate::resolver::Decision;

fn backend_failure(err: ResolverError, what: &str, name: &str) -> CategorizationError {
    warn!("Database error looking up {what} '{name}': {err}");
    CategorizationError::DatabaseError
}

/// Finds the category named `name`. Several rows may share a name under
/// different parents: a top-level row wins, otherwise the lowest id.
pub fn safe_category_lookup<R: EntityResolver + ?Sized>(
    resolver: &R,
    name: &str,
    prefix: &str,
) -> Result<Category, CategorizationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategorizationError::no_suggestion(prefix, LookupTarget::Subcategory));
    }

    let mut matches = resolver
        .categories_named(name)
        .map_err(|e| backend_failure(e, "category", name))?;
    matches.sort_by_key(|c| (!c.is_top_level(), c.id));

    match matches.into_iter().next() {
        Some(category) => Ok(category),
        None => {
            warn!("Category lookup failed for '{name}' ({prefix})");
            Err(CategorizationError::lookup_failed(prefix, LookupTarget::Subcategory))
        }
    }
}

/// Finds the payoree named `name`, exactly first and then by normalized
/// name. Several normalized matches resolve to the lowest id.
pub fn safe_payoree_lookup<R: EntityResolver + ?Sized>(
    resolver: &R,
    name: &str,
    prefix: &str,
) -> Result<Payoree, CategorizationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategorizationError::no_suggestion(prefix, LookupTarget::Payoree));
    }

    if let Some(exact) = resolver
        .payoree_named(name)
        .map_err(|e| backend_failure(e, "payoree", name))?
    {
        return Ok(exact);
    }

    let normalized = normalize_name(name);
    if !normalized.is_empty() {
        let found = resolver
            .payorees_normalized(&normalized)
            .map_err(|e| backend_failure(e, "payoree", name))?
            .into_iter()
            .min_by_key(|p| p.id);
        if let Some(payoree) = found {
            return Ok(payoree);
        }
    }

    warn!("Payoree lookup failed for '{name}' ({prefix})");
    Err(CategorizationError::lookup_failed(prefix, LookupTarget::Payoree))
}

/// Entities ready to write onto a transaction row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAssignment {
    pub category: Option<Category>,
    pub subcategory: Option<Category>,
    pub payoree: Option<Payoree>,
    /// First failure encountered; later ones are dropped.
    pub error: Option<CategorizationError>,
}

impl EntityAssignment {
    pub fn error_code(&self) -> Option<String> {
        self.error.as_ref().map(CategorizationError::code)
    }

    fn fail(&mut self, err: CategorizationError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Resolves a decision's names. A decision without a subcategory is
    /// looked up by its category name.
    pub fn from_decision<R: EntityResolver + ?Sized>(
        resolver: &R,
        prefix: &str,
        decision: &Decision,
    ) -> Self {
        let subcategory = if decision.subcategory.trim().is_empty() {
            decision.category.as_str()
        } else {
            decision.subcategory.as_str()
        };
        assign_entities(
            resolver,
            prefix,
            subcategory,
            decision.payoree.as_deref().unwrap_or(""),
        )
    }
}

/// Looks up both names and fills what it can. A top-level match fills
/// `category` only; a nested match fills `subcategory` and its parent.
pub fn assign_entities<R: EntityResolver + ?Sized>(
    resolver: &R,
    prefix: &str,
    subcategory_name: &str,
    payoree_name: &str,
) -> EntityAssignment {
    let mut out = EntityAssignment::default();

    match safe_category_lookup(resolver, subcategory_name, prefix) {
        Ok(found) => match found.parent_id {
            None => out.category = Some(found),
            Some(parent_id) => match resolver.category(parent_id) {
                Ok(Some(parent)) => {
                    out.category = Some(parent);
                    out.subcategory = Some(found);
                }
                Ok(None) => {
                    warn!("Category '{}' points at missing parent {parent_id}", found.name);
                    out.fail(CategorizationError::DataCorruption);
                }
                Err(e) => out.fail(backend_failure(e, "category", &found.name)),
            },
        },
        Err(e) => out.fail(e),
    }

    match safe_payoree_lookup(resolver, payoree_name, prefix) {
        Ok(payoree) => out.payoree = Some(payoree),
        Err(e) => out.fail(e),
    }

    out
}
