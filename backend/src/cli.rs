use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use demand::SelloutSignals;
use watch::model::Event;

#[derive(Debug, Parser)]
#[clap(name = "surge-watch", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll watched artists for new events until Ctrl-C
    Run,

    /// Manage surge watches
    Watch {
        #[clap(subcommand)]
        action: WatchAction,
    },

    /// Score an artist metric snapshot read from a JSON file
    Score { file: PathBuf },

    /// Composite score, market heat and ranked cities for one artist
    Report {
        artist: String,

        /// JSON array of metric snapshots to serve as provider data
        #[clap(long)]
        metrics: Option<PathBuf>,

        /// Number of cities to rank
        #[clap(long, default_value = "10")]
        limit: usize,

        /// JSON object of city to 0..100 demand weight
        #[clap(long)]
        weights: Option<PathBuf>,
    },

    /// One-off sellout probability
    Sellout(SelloutArgs),
}

#[derive(Debug, Subcommand)]
pub enum WatchAction {
    /// Start (or extend) watching an artist
    Add {
        artist: String,

        /// Watch duration; defaults to SURGE_DEFAULT_DAYS
        #[clap(long)]
        days: Option<u32>,
    },

    /// Stop watching an artist
    Remove { artist: String },

    /// List active watches
    List,
}

#[derive(Debug, Args)]
pub struct SelloutArgs {
    /// Market heat, 0..100
    #[clap(long, default_value = "50")]
    pub heat: f64,

    /// Artist popularity, 0..100
    #[clap(long, default_value = "50")]
    pub popularity: f64,

    /// Recent momentum, 0..100
    #[clap(long, default_value = "50")]
    pub momentum: f64,

    #[clap(long)]
    pub capacity: Option<u32>,

    /// Inventory pressure, 0..100
    #[clap(long)]
    pub inventory: Option<f64>,

    /// Days until the event; derived from --date when omitted
    #[clap(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Event date, YYYY-MM-DD
    #[clap(long)]
    pub date: Option<String>,

    /// Event city; its weight from --weights is blended into the heat
    #[clap(long)]
    pub city: Option<String>,

    /// JSON object of city to 0..100 demand weight
    #[clap(long)]
    pub weights: Option<PathBuf>,
}

impl SelloutArgs {
    pub fn signals(&self) -> SelloutSignals {
        SelloutSignals {
            market_heat: self.heat,
            popularity: self.popularity,
            momentum: self.momentum,
            venue_capacity: self.capacity,
            inventory_pressure: self.inventory,
            days_until_event: self.days,
        }
    }

    /// The event the estimate is for; only date, city and capacity matter.
    pub fn event(&self) -> Event {
        Event {
            name: "ad hoc".to_string(),
            date: self.date.clone(),
            city: self.city.clone(),
            capacity: self.capacity,
            ..Event::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_add_with_days() {
        let cli = Cli::try_parse_from(["surge-watch", "watch", "add", "Big Thief", "--days", "3"]).unwrap();

        match cli.command {
            Command::Watch {
                action: WatchAction::Add { artist, days },
            } => {
                assert_eq!(artist, "Big Thief");
                assert_eq!(days, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sellout_defaults_to_neutral_signals() {
        let cli = Cli::try_parse_from(["surge-watch", "sellout", "--capacity", "2500"]).unwrap();

        let Command::Sellout(args) = cli.command else {
            panic!("expected sellout");
        };
        let signals = args.signals();
        assert_eq!(signals.market_heat, 50.0);
        assert_eq!(signals.venue_capacity, Some(2_500));
        assert_eq!(signals.days_until_event, None);
        assert_eq!(args.event().capacity, Some(2_500));
    }

    #[test]
    fn sellout_city_and_weights() {
        let cli = Cli::try_parse_from([
            "surge-watch",
            "sellout",
            "--city",
            "Austin, TX",
            "--weights",
            "weights.json",
        ])
        .unwrap();

        let Command::Sellout(args) = cli.command else {
            panic!("expected sellout");
        };
        assert_eq!(args.event().city.as_deref(), Some("Austin, TX"));
        assert_eq!(args.weights, Some(PathBuf::from("weights.json")));
    }

    #[test]
    fn report_requires_an_artist() {
        assert!(Cli::try_parse_from(["surge-watch", "report"]).is_err());
    }
}
