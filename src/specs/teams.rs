// src/specs/teams.rs
//! Reading *spec* for organisation payloads.
//!
//! Purpose:
//! - Read one page of the entity-list endpoint
//!   (`sports[0].leagues[0].teams[].team`) into [`Entity`] records.
//! - Read the single-entity endpoint (`{"team": {...}}`) used for
//!   organisations the list no longer returns.
//!
//! Non-Responsibilities:
//! - **No fetching or caching.** Callers hand in raw bytes.
//! - **No pagination decisions.** [`EntityPage::raw_count`] tells discovery
//!   how many entries the page carried; discovery decides whether to go on.

use serde_json::Value;

use crate::core::json::{array_at, bool_at, first_str, parse_object, str_at};
use crate::data::{Entity, Partition};
use crate::error::NormalizationError;

#[derive(Clone, Debug, PartialEq)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    /// Entries on the page, including ones skipped for lacking an id.
    pub raw_count: usize,
}

pub fn parse_entity_list(partition: Partition, raw: &[u8]) -> Result<EntityPage, NormalizationError> {
    let v = parse_object(raw)?;
    let teams = array_at(&v, path!["sports", [0], "leagues", [0], "teams"])
        .ok_or(NormalizationError::MissingBlock("sports[0].leagues[0].teams"))?;

    let entities = teams
        .iter()
        .filter_map(|entry| {
            // entries are usually wrapped as {"team": {...}}
            let team = entry.get("team").unwrap_or(entry);
            entity_from(team, partition)
        })
        .collect();

    Ok(EntityPage { entities, raw_count: teams.len() })
}

pub fn parse_entity(partition: Partition, raw: &[u8]) -> Result<Entity, NormalizationError> {
    let v = parse_object(raw)?;
    let team = v.get("team").unwrap_or(&v);
    entity_from(team, partition).ok_or(NormalizationError::MissingBlock("team.id"))
}

fn entity_from(team: &Value, partition: Partition) -> Option<Entity> {
    let id = str_at(team, path!["id"])?;
    Some(Entity {
        id,
        partition: Some(partition),
        display_name: str_at(team, path!["displayName"]),
        short_name: str_at(team, path!["shortDisplayName"]),
        abbreviation: str_at(team, path!["abbreviation"]),
        location: str_at(team, path!["location"]),
        nickname: first_str(team, &[path!["name"], path!["nickname"]]),
        slug: str_at(team, path!["slug"]),
        color: str_at(team, path!["color"]),
        alternate_color: str_at(team, path!["alternateColor"]),
        conference_id: first_str(team, &[path!["groups", "id"], path!["conferenceId"]]),
        is_active: bool_at(team, path!["isActive"]),
        logo: str_at(team, path!["logos", [0], "href"]),
        seasons: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"{
      "sports": [{"leagues": [{"teams": [
        {"team": {"id": "150", "slug": "duke-blue-devils", "abbreviation": "DUKE",
                  "displayName": "Duke Blue Devils", "shortDisplayName": "Duke",
                  "name": "Blue Devils", "location": "Duke", "color": "00539b",
                  "isActive": true, "logos": [{"href": "https://a.espncdn.com/duke.png"}]}},
        {"team": {"displayName": "No Id U"}},
        {"team": {"id": 2509, "displayName": "Purdue Boilermakers"}}
      ]}]}]
    }"##;

    #[test]
    fn reads_list_page() {
        let page = parse_entity_list(Partition::Mens, PAGE.as_bytes()).unwrap();
        assert_eq!(page.raw_count, 3);
        assert_eq!(page.entities.len(), 2);

        let duke = &page.entities[0];
        assert_eq!(duke.id, "150");
        assert_eq!(duke.nickname.as_deref(), Some("Blue Devils"));
        assert_eq!(duke.logo.as_deref(), Some("https://a.espncdn.com/duke.png"));
        assert_eq!(duke.is_active, Some(true));
        assert_eq!(duke.partition, Some(Partition::Mens));

        // numeric ids are accepted and kept as strings
        assert_eq!(page.entities[1].id, "2509");
        assert_eq!(page.entities[1].color, None);
    }

    #[test]
    fn list_without_teams_block_is_an_error() {
        let err = parse_entity_list(Partition::Mens, br#"{"sports": []}"#).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingBlock(_)));
    }

    #[test]
    fn reads_single_entity() {
        let raw = br#"{"team": {"id": "42", "displayName": "Hartford Hawks", "groups": {"id": "46"}}}"#;
        let e = parse_entity(Partition::Womens, raw).unwrap();
        assert_eq!(e.id, "42");
        assert_eq!(e.conference_id.as_deref(), Some("46"));
        assert!(parse_entity(Partition::Womens, br#"{"team": {}}"#).is_err());
    }
}
