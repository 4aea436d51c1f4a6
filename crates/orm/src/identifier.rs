//! Identifier codec
//!
//! An identifier is the collection tag followed by the collection's id parts,
//! all joined with `/`:
//!
//! ```text
//! Tickets/<guildId>/<authorId>/<channelId>
//! DatabaseMetadata
//! ```
//!
//! There is no escaping. A part containing the separator is rejected at
//! compose time, which keeps `decompose` a pure inverse of `compose`.

use crate::collection::Collection;
use crate::error::{ModelError, OrmResult};

pub const SEPARATOR: char = '/';

/// Build the identifier for `parts` in `collection`.
pub fn compose<S: AsRef<str>>(collection: Collection, parts: &[S]) -> OrmResult<String> {
    if parts.len() != collection.arity() {
        return Err(ModelError::malformed(
            render(collection, parts),
            format!(
                "{} expects {} id parts, got {}",
                collection,
                collection.arity(),
                parts.len()
            ),
        ));
    }

    for (name, part) in collection.id_parts().iter().zip(parts) {
        let part: &str = part.as_ref();
        if part.contains(SEPARATOR) {
            return Err(ModelError::malformed(
                render(collection, parts),
                format!("id part '{}' contains the reserved separator: '{}'", name, part),
            ));
        }
    }

    Ok(render(collection, parts))
}

/// Split an identifier back into its collection and ordered parts.
pub fn decompose(id: &str) -> OrmResult<(Collection, Vec<String>)> {
    let mut segments = id.split(SEPARATOR);
    let tag = segments.next().unwrap_or_default();
    let collection = tag
        .parse::<Collection>()
        .map_err(|_| ModelError::UnknownCollection { id: id.to_string() })?;

    let parts: Vec<String> = segments.map(str::to_string).collect();
    if parts.len() != collection.arity() {
        return Err(ModelError::malformed(
            id,
            format!(
                "{} expects {} id parts, found {}",
                collection,
                collection.arity(),
                parts.len()
            ),
        ));
    }

    Ok((collection, parts))
}

/// Collection tag embedded in an identifier
pub fn collection_of(id: &str) -> OrmResult<Collection> {
    decompose(id).map(|(collection, _)| collection)
}

/// The identifier with its collection prefix removed (empty for singletons)
pub fn bare_id(id: &str) -> &str {
    match id.split_once(SEPARATOR) {
        Some((_, rest)) => rest,
        None => "",
    }
}

fn render<S: AsRef<str>>(collection: Collection, parts: &[S]) -> String {
    let mut id = collection.as_str().to_string();
    for part in parts {
        id.push(SEPARATOR);
        id.push_str(part.as_ref());
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_scenario_round_trips() {
        let id = compose(Collection::Reports, &["111", "222", "1700000000000"]).unwrap();
        assert_eq!(id, "Reports/111/222/1700000000000");

        let (collection, parts) = decompose(&id).unwrap();
        assert_eq!(collection, Collection::Reports);
        assert_eq!(parts, vec!["111", "222", "1700000000000"]);
    }

    #[test]
    fn test_round_trip_every_collection() {
        for collection in Collection::ALL {
            let parts: Vec<String> = (0..collection.arity())
                .map(|i| format!("{}{}", 900_000 + i, i))
                .collect();
            let id = compose(collection, &parts).unwrap();
            assert_eq!(decompose(&id).unwrap(), (collection, parts));
        }
    }

    #[test]
    fn test_singleton_identifier() {
        let id = compose::<&str>(Collection::DatabaseMetadata, &[]).unwrap();
        assert_eq!(id, "DatabaseMetadata");
        assert_eq!(bare_id(&id), "");
        assert_eq!(decompose(&id).unwrap(), (Collection::DatabaseMetadata, vec![]));
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let err = compose(Collection::Tickets, &["g1", "a1"]).unwrap_err();
        assert!(matches!(err, ModelError::MalformedId { .. }));

        let err = decompose("Tickets/g1/a1").unwrap_err();
        assert!(matches!(err, ModelError::MalformedId { .. }));

        let err = decompose("Tickets/g1/a1/c1/extra").unwrap_err();
        assert!(matches!(err, ModelError::MalformedId { .. }));
    }

    #[test]
    fn test_separator_inside_part_is_rejected() {
        let err = compose(Collection::Tickets, &["g1", "a/1", "c1"]).unwrap_err();
        assert!(err.to_string().contains("authorId"));
    }

    #[test]
    fn test_unknown_collection_carries_id() {
        match decompose("Widgets/1").unwrap_err() {
            ModelError::UnknownCollection { id } => assert_eq!(id, "Widgets/1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bare_id() {
        assert_eq!(bare_id("Tickets/g1/a1/c1"), "g1/a1/c1");
        assert_eq!(collection_of("Tickets/g1/a1/c1").unwrap(), Collection::Tickets);
    }
}
