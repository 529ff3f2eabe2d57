//! Wire shapes of the Discovery-style events API.
//!
//! Only the fields the watcher reads are modelled; everything else in the
//! payload is ignored. Every field is optional upstream.

use serde::Deserialize;
use watch::model::Event;

#[derive(Debug, Default, Deserialize)]
pub struct EventsEnvelope {
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbeddedEvents {
    #[serde(default)]
    pub events: Vec<DiscoveryEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub dates: Option<Dates>,
    pub sales: Option<Sales>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<EmbeddedVenues>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dates {
    pub start: Option<StartDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDate {
    pub local_date: Option<String>,
    pub local_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sales {
    #[serde(default)]
    pub presales: Vec<Presale>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Presale {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbeddedVenues {
    #[serde(default)]
    pub venues: Vec<Venue>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Venue {
    pub name: Option<String>,
    pub city: Option<Named>,
    pub state: Option<StateRef>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Named {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRef {
    pub state_code: Option<String>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Venue {
    /// `"City, ST"` when the state code is known, else just the city.
    pub fn display_city(&self) -> Option<String> {
        let city = non_blank(self.city.as_ref().and_then(|c| c.name.clone()))?;
        match non_blank(self.state.as_ref().and_then(|s| s.state_code.clone())) {
            Some(state) => Some(format!("{city}, {state}")),
            None => Some(city),
        }
    }
}

impl DiscoveryEvent {
    /// Converts to the domain event. Listings without a name are dropped.
    pub fn into_event(self, artist_key: &str) -> Option<Event> {
        let name = non_blank(self.name)?;

        let venue = self
            .embedded
            .and_then(|e| e.venues.into_iter().next())
            .unwrap_or_default();
        let start = self.dates.and_then(|d| d.start).unwrap_or_default();
        let presale_url = self
            .sales
            .and_then(|s| s.presales.into_iter().find_map(|p| non_blank(p.url)));

        Some(Event {
            id: non_blank(self.id),
            artist_key: artist_key.to_string(),
            name,
            city: venue.display_city(),
            venue: non_blank(venue.name),
            capacity: venue.capacity,
            date: non_blank(start.local_date),
            time: non_blank(start.local_time),
            url: non_blank(self.url),
            presale_url,
        })
    }
}
