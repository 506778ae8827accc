use anyhow::anyhow;
use chrono::{DateTime, Utc};
use weather_core::{ConditionKind, HistoryEntry, SessionState, WeatherSnapshot};

/// Print the session state; a failed lookup becomes the command's error.
pub fn state(state: &SessionState) -> anyhow::Result<()> {
    match state {
        SessionState::Loading => {
            println!("Loading...");
            Ok(())
        }
        SessionState::Ready(snapshot) => {
            print!("{}", snapshot_block(snapshot, Utc::now()));
            Ok(())
        }
        SessionState::Failed(message) => Err(anyhow!("{message}")),
    }
}

pub fn history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No history yet.");
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        println!("{:>2}. {}", i + 1, history_line(entry));
    }
}

pub fn history_line(entry: &HistoryEntry) -> String {
    let snap = entry.snapshot();
    format!("{}  {:.1}°C", snap.location_label(), snap.main.temp)
}

fn snapshot_block(snap: &WeatherSnapshot, now: DateTime<Utc>) -> String {
    let night = snap.is_night_at(now);
    let description = snap.condition().map(|c| c.description.as_str()).unwrap_or("unknown");

    format!(
        "{label}\n\
         {glyph} {temp}°C  {description}\n\
         Feels like {feels}°C, humidity {humidity}%\n\
         Sunrise {sunrise}  Sunset {sunset}\n",
        label = snap.location_label(),
        glyph = glyph(snap.condition_kind(), night),
        temp = snap.main.temp.round() as i64,
        feels = snap.main.feels_like.round() as i64,
        humidity = snap.main.humidity,
        sunrise = snap.sunrise_local(),
        sunset = snap.sunset_local(),
    )
}

fn glyph(kind: ConditionKind, night: bool) -> &'static str {
    match kind {
        ConditionKind::Clear if night => "🌙",
        ConditionKind::Clear => "☀️",
        ConditionKind::Clouds if night => "☁️🌙",
        ConditionKind::Clouds => "☁️",
        ConditionKind::Rain | ConditionKind::Drizzle => "🌧️",
        ConditionKind::Snow => "❄️",
        ConditionKind::Thunderstorm => "⛈️",
        ConditionKind::Atmosphere => "🌫️",
        ConditionKind::Other => "🌡️",
    }
}
