//! The feeling catalog — static reference data for the board.
//!
//! Categories and tiles are fixed at build time and read-only for the
//! lifetime of the process. Runtime state (personalized images) is keyed by
//! tile key and lives in the engine, never here.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Supported spoken/display languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Es,
    Pt,
}

impl Lang {
    /// BCP-47 primary language subtag, used for voice matching.
    pub fn tag(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
            Lang::Pt => "pt",
        }
    }

    pub const ALL: [Lang; 3] = [Lang::En, Lang::Es, Lang::Pt];
}

impl Default for Lang {
    fn default() -> Self {
        Lang::En
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Ok(Lang::En),
            "es" | "spa" | "spanish" => Ok(Lang::Es),
            "pt" | "por" | "portuguese" => Ok(Lang::Pt),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// A label translated into exactly the supported language set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedLabel {
    pub en: String,
    pub es: String,
    pub pt: String,
}

impl LocalizedLabel {
    pub fn new(en: impl Into<String>, es: impl Into<String>, pt: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            es: es.into(),
            pt: pt.into(),
        }
    }

    pub fn get(&self, lang: Lang) -> &str {
        match lang {
            Lang::En => &self.en,
            Lang::Es => &self.es,
            Lang::Pt => &self.pt,
        }
    }
}

/// One feeling entry: a key, its translations and a reference illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSpec {
    /// Unique within its category (and within the builtin set, globally).
    pub key: String,
    pub label: LocalizedLabel,
    /// Relative asset path of the un-personalized reference image.
    pub reference_image: String,
}

/// A themed group of tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub key: String,
    pub label: LocalizedLabel,
    /// Illustration shown on the category tab.
    pub category_image: String,
    /// Ordered; the pipeline walks tiles in this order.
    pub tiles: Vec<TileSpec>,
}

/// The full board: ordered categories of ordered tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The builtin feelings board: 4 categories × 6 tiles.
    pub fn builtin() -> &'static Catalog {
        static BUILTIN: OnceLock<Catalog> = OnceLock::new();
        BUILTIN.get_or_init(builtin_catalog)
    }

    /// All tiles in catalog order, paired with their category.
    pub fn tiles(&self) -> impl Iterator<Item = (&Category, &TileSpec)> {
        self.categories
            .iter()
            .flat_map(|c| c.tiles.iter().map(move |t| (c, t)))
    }

    pub fn tile_count(&self) -> usize {
        self.categories.iter().map(|c| c.tiles.len()).sum()
    }

    pub fn find_category(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn find_tile(&self, key: &str) -> Option<&TileSpec> {
        self.tiles().map(|(_, t)| t).find(|t| t.key == key)
    }
}

fn tile(key: &str, en: &str, es: &str, pt: &str, asset: &str) -> TileSpec {
    TileSpec {
        key: key.to_string(),
        label: LocalizedLabel::new(en, es, pt),
        reference_image: asset.to_string(),
    }
}

fn builtin_catalog() -> Catalog {
    Catalog::new(vec![
        Category {
            key: "goodBody".into(),
            label: LocalizedLabel::new(
                "My Body Feels Good",
                "Mi Cuerpo Se Siente Bien",
                "Meu Corpo Se Sente Bem",
            ),
            category_image: "assets/feelings/goodPhysical.jpg".into(),
            tiles: vec![
                tile(
                    "comfortable",
                    "Comfortable",
                    "Cómodo",
                    "Confortável",
                    "assets/feelings/goodBody/comfortable.jpg",
                ),
                tile(
                    "relaxed",
                    "Relaxed",
                    "Relajado",
                    "Relaxado",
                    "assets/feelings/goodBody/relaxed.jpg",
                ),
                tile(
                    "ok",
                    "I'm OK",
                    "Estoy Bien",
                    "Estou Bem",
                    "assets/feelings/goodBody/ok.jpg",
                ),
                tile(
                    "warm",
                    "Warm",
                    "Cálido",
                    "Quente",
                    "assets/feelings/goodBody/warm.jpg",
                ),
                tile(
                    "strong",
                    "Strong",
                    "Fuerte",
                    "Forte",
                    "assets/feelings/goodBody/strong.jpg",
                ),
                tile(
                    "energetic",
                    "Energetic",
                    "Energético",
                    "Energético",
                    "assets/feelings/goodBody/energetic.jpg",
                ),
            ],
        },
        Category {
            key: "goodFeelings".into(),
            label: LocalizedLabel::new(
                "My Feelings Are Good",
                "Mis Sentimientos Son Buenos",
                "Meus Sentimentos São Bons",
            ),
            category_image: "assets/feelings/goodEmotional.jpg".into(),
            tiles: vec![
                tile(
                    "happy",
                    "Happy",
                    "Feliz",
                    "Feliz",
                    "assets/feelings/goodFeelings/happy.jpg",
                ),
                tile(
                    "excited",
                    "Excited",
                    "Emocionado",
                    "Animado",
                    "assets/feelings/goodFeelings/excited.jpg",
                ),
                tile(
                    "loved",
                    "Loved",
                    "Amado",
                    "Amado",
                    "assets/feelings/goodFeelings/loved.jpg",
                ),
                tile(
                    "calm",
                    "Calm",
                    "Tranquilo",
                    "Calmo",
                    "assets/feelings/goodFeelings/calm.jpg",
                ),
                tile(
                    "proud",
                    "Proud",
                    "Orgulloso",
                    "Orgulhoso",
                    "assets/feelings/goodFeelings/proud.jpg",
                ),
                tile(
                    "silly",
                    "Silly",
                    "Tonto",
                    "Bobo",
                    "assets/feelings/goodFeelings/silly.jpg",
                ),
            ],
        },
        Category {
            key: "badFeelings".into(),
            label: LocalizedLabel::new(
                "My Feelings Are Bad",
                "Mis Sentimientos Son Malos",
                "Meus Sentimentos São Ruins",
            ),
            category_image: "assets/feelings/badEmotional.jpg".into(),
            tiles: vec![
                tile(
                    "sad",
                    "Sad",
                    "Triste",
                    "Triste",
                    "assets/feelings/badFeeling/sad.jpg",
                ),
                tile(
                    "bored",
                    "Bored",
                    "Aburrido",
                    "Entediado",
                    "assets/feelings/badFeeling/bored.jpg",
                ),
                tile(
                    "scared",
                    "Scared",
                    "Asustado",
                    "Assustado",
                    "assets/feelings/badFeeling/scared.jpg",
                ),
                tile(
                    "worried",
                    "Worried",
                    "Preocupado",
                    "Preocupado",
                    "assets/feelings/badFeeling/worried.jpg",
                ),
                tile(
                    "embarrassed",
                    "Embarrassed",
                    "Avergonzado",
                    "Envergonhado",
                    "assets/feelings/badFeeling/embarrassed.jpg",
                ),
                tile(
                    "angry",
                    "Angry",
                    "Enojado",
                    "Bravo",
                    "assets/feelings/badFeeling/angry.jpg",
                ),
            ],
        },
        Category {
            key: "badBody".into(),
            label: LocalizedLabel::new("My Body Hurts", "Mi Cuerpo Duele", "Meu Corpo Dói"),
            category_image: "assets/feelings/badPhysical.jpg".into(),
            tiles: vec![
                tile(
                    "cold",
                    "Cold",
                    "Frío",
                    "Frio",
                    "assets/feelings/badBody/cold.jpg",
                ),
                tile(
                    "hurt",
                    "Hurt",
                    "Herido",
                    "Machucado",
                    "assets/feelings/badBody/hurt.jpg",
                ),
                tile(
                    "sick",
                    "Sick",
                    "Enfermo",
                    "Doente",
                    "assets/feelings/badBody/sick.jpg",
                ),
                tile(
                    "tired",
                    "Tired",
                    "Cansado",
                    "Cansado",
                    "assets/feelings/badBody/tired.jpg",
                ),
                tile(
                    "dizzy",
                    "Dizzy",
                    "Mareado",
                    "Tonto",
                    "assets/feelings/badBody/dizzy.jpg",
                ),
                tile(
                    "itchy",
                    "Itchy",
                    "Con Picazón",
                    "Com Coceira",
                    "assets/feelings/badBody/itchy.jpg",
                ),
            ],
        },
    ])
}
