// src/config/partitions.rs
//! Per-partition endpoint templates and the organisations the list endpoint
//! does not return.

use serde::{Deserialize, Serialize};

use crate::data::{Entity, Partition, Season};

/// URL templates for the four endpoint families. Placeholders:
/// `{id}`, `{season}`, `{page}`, `{limit}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub entity_list: String,
    pub entity: String,
    pub schedule: String,
    pub contest: String,
}

const SITE_API: &str = "https://site.api.espn.com/apis/site/v2/sports/basketball";
const SITE_WEB_API: &str = "https://site.web.api.espn.com/apis/site/v2/sports/basketball";

fn league(p: Partition) -> &'static str {
    match p {
        Partition::Mens => "mens-college-basketball",
        Partition::Womens => "womens-college-basketball",
    }
}

impl Endpoints {
    /// Public ESPN site API for `p`.
    pub fn espn(p: Partition) -> Self {
        let lg = league(p);
        Self {
            entity_list: format!("{SITE_API}/{lg}/teams?limit={{limit}}&page={{page}}"),
            entity: format!("{SITE_API}/{lg}/teams/{{id}}"),
            schedule: format!("{SITE_API}/{lg}/teams/{{id}}/schedule?season={{season}}"),
            contest: format!("{SITE_WEB_API}/{lg}/summary?event={{id}}"),
        }
    }

    pub fn entity_list_url(&self, page: u32, limit: u32) -> String {
        self.entity_list.replace("{page}", &page.to_string()).replace("{limit}", &limit.to_string())
    }

    pub fn entity_url(&self, id: &str) -> String {
        self.entity.replace("{id}", id)
    }

    pub fn schedule_url(&self, id: &str, season: Season) -> String {
        self.schedule.replace("{id}", id).replace("{season}", &season.to_string())
    }

    pub fn contest_url(&self, id: &str) -> String {
        self.contest.replace("{id}", id)
    }
}

/// An organisation fetched individually because the list endpoint omits it.
#[derive(Clone, Copy, Debug)]
pub struct Supplemental {
    pub id: &'static str,
    pub name: &'static str,
    /// Seasons it belonged to the division, if bounded.
    pub seasons: Option<(Season, Season)>,
}

impl Supplemental {
    pub fn to_entity(&self, partition: Partition) -> Entity {
        Entity {
            id: s!(self.id),
            partition: Some(partition),
            display_name: Some(s!(self.name)),
            seasons: self.seasons,
            ..Default::default()
        }
    }
}

const fn sup(id: &'static str, name: &'static str, seasons: Option<(Season, Season)>) -> Supplemental {
    Supplemental { id, name, seasons }
}

static MENS_SUPPLEMENTAL: &[Supplemental] = &[
    sup("3", "Birmingham-Southern Panthers", Some((2003, 2006))),
    sup("2113", "Centenary (LA) Gentlemen", Some((1985, 2011))),
    sup("42", "Hartford Hawks", Some((1985, 2023))),
    sup("2417", "Morris Brown Wolverines", Some((2002, 2003))),
    sup("2542", "Savannah State Tigers", Some((2003, 2019))),
    sup("2597", "St. Francis Brooklyn Terriers", Some((1985, 2023))),
    sup("2736", "Winston-Salem Rams", Some((2007, 2010))),
    sup("2815", "Lindenwood Lions", Some((2023, 2025))),
    sup("2511", "Queens University Royals", Some((2023, 2025))),
    sup("88", "Southern Indiana Screaming Eagles", Some((2023, 2025))),
];

static WOMENS_SUPPLEMENTAL: &[Supplemental] = &[
    sup("3", "Birmingham-Southern Panthers", None),
    sup("2113", "Centenary (LA) Gentlemen", None),
    sup("42", "Hartford Hawks", None),
    sup("2417", "Morris Brown Wolverines", None),
    sup("2542", "Savannah State Tigers", None),
    sup("2597", "St. Francis Brooklyn Terriers", None),
    sup("2736", "Winston-Salem Rams", None),
    sup("2385", "Mercyhurst Lakers", None),
    sup("2698", "West Georgia Wolves", None),
];

pub fn supplemental(p: Partition) -> &'static [Supplemental] {
    match p {
        Partition::Mens => MENS_SUPPLEMENTAL,
        Partition::Womens => WOMENS_SUPPLEMENTAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fill() {
        let ep = Endpoints::espn(Partition::Womens);
        assert_eq!(
            ep.schedule_url("52", 2019),
            "https://site.api.espn.com/apis/site/v2/sports/basketball/womens-college-basketball/teams/52/schedule?season=2019"
        );
        assert!(ep.entity_list_url(2, 500).ends_with("/teams?limit=500&page=2"));
        assert!(ep.contest_url("401").ends_with("summary?event=401"));
        assert!(ep.contest.starts_with(SITE_WEB_API));
    }

    #[test]
    fn partitions_are_namespaced() {
        let m = Endpoints::espn(Partition::Mens);
        let w = Endpoints::espn(Partition::Womens);
        assert_ne!(m.entity_url("1"), w.entity_url("1"));
    }

    #[test]
    fn supplemental_windows() {
        let e = supplemental(Partition::Mens).iter().find(|s| s.id == "2736").unwrap().to_entity(Partition::Mens);
        assert!(e.active_in(2008));
        assert!(!e.active_in(2012));
        assert_eq!(e.display_name.as_deref(), Some("Winston-Salem Rams"));
    }
}
