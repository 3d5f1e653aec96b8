/// Country text → federation lookups.
///
/// The roster is typed in by hand, so the tables carry the misspellings and
/// abbreviations seen in real entry lists next to the canonical names.
use crate::Federation;

/// Alias → federation. `None` rows mark text that is known to mean "no
/// federation" rather than an unrecognised spelling.
const FEDERATION_ALIASES: &[(&str, Option<Federation>)] = &[
    ("Australia", Some(Federation::Aus)),
    ("Austrlaia", Some(Federation::Aus)),
    ("Ausralia", Some(Federation::Aus)),
    ("Australlia", Some(Federation::Aus)),
    ("AUS", Some(Federation::Aus)),
    ("ACF", Some(Federation::Aus)),
    ("New Zealand", Some(Federation::Nzl)),
    ("NZ", Some(Federation::Nzl)),
    ("NZL", Some(Federation::Nzl)),
    ("NZCF", Some(Federation::Nzl)),
    ("Guam", Some(Federation::Gum)),
    ("GUM", Some(Federation::Gum)),
    ("Nauru", Some(Federation::Nru)),
    ("NRU", Some(Federation::Nru)),
    ("Fiji", Some(Federation::Fij)),
    ("FIJ", Some(Federation::Fij)),
    ("New Caledonia", Some(Federation::Ncl)),
    ("Nouvelle-Caledonie", Some(Federation::Ncl)),
    ("NCL", Some(Federation::Ncl)),
    ("Vanuatu", Some(Federation::Van)),
    ("VAN", Some(Federation::Van)),
    ("Tonga", Some(Federation::Tga)),
    ("TGA", Some(Federation::Tga)),
    ("Papua New Guinea", Some(Federation::Png)),
    ("PNG", Some(Federation::Png)),
    ("NA", None),
    ("N/A", None),
];

const FLAGS: &[(&str, &str)] = &[
    ("Australia", "🇦🇺"),
    ("Austrlaia", "🇦🇺"),
    ("Ausralia", "🇦🇺"),
    ("Australlia", "🇦🇺"),
    ("AUS", "🇦🇺"),
    ("ACF", "🇦🇺"),
    ("New Zealand", "🇳🇿"),
    ("NZ", "🇳🇿"),
    ("NZL", "🇳🇿"),
    ("NZCF", "🇳🇿"),
    ("Guam", "🇬🇺"),
    ("GUM", "🇬🇺"),
    ("Nauru", "🇳🇷"),
    ("NRU", "🇳🇷"),
    ("Fiji", "🇫🇯"),
    ("FIJ", "🇫🇯"),
    ("New Caledonia", "🇳🇨"),
    ("Nouvelle-Caledonie", "🇳🇨"),
    ("NCL", "🇳🇨"),
    ("Vanuatu", "🇻🇺"),
    ("VAN", "🇻🇺"),
    ("Tonga", "🇹🇴"),
    ("TGA", "🇹🇴"),
    ("Papua New Guinea", "🇵🇬"),
    ("PNG", "🇵🇬"),
];

/// Resolve free-text country to a federation. Exact match wins, then a
/// case-insensitive pass. Blank and unknown text resolve to `None`.
pub fn resolve_federation(country: &str) -> Option<Federation> {
    lookup(FEDERATION_ALIASES, country).flatten()
}

/// Flag glyph for display next to the country column.
pub fn resolve_flag(country: &str) -> Option<&'static str> {
    lookup(FLAGS, country)
}

fn lookup<T: Copy>(table: &[(&str, T)], country: &str) -> Option<T> {
    let needle = country.trim();
    if needle.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|(alias, _)| *alias == needle)
        .or_else(|| table.iter().find(|(alias, _)| alias.eq_ignore_ascii_case(needle)))
        .map(|(_, value)| *value)
}
