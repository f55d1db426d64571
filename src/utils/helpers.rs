// utils/helpers.rs
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Générer un nom de modèle `Model_<5 chiffres>` (collisions acceptées)
pub fn generate_model_name() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(10000..=99999);
    format!("Model_{}", suffix)
}

/// Formater une date pour l'affichage
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Convertir des secondes en durée lisible
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{} secondes", seconds)
    } else if seconds < 3600 {
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;
        format!("{} minutes {} secondes", minutes, remaining_seconds)
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let remaining_seconds = seconds % 60;
        format!("{} heures {} minutes {} secondes", hours, minutes, remaining_seconds)
    }
}

/// Durée moyenne par élément; zéro si aucun élément
pub fn average_duration(total: Duration, count: usize) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    total / count as u32
}
