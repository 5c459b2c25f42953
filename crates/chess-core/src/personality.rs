//! Piece personalities: the voice each of the twelve (piece, side) pairs speaks with.
//!
//! Personalities are plain data. Commentary style is derived from the trait
//! scores by threshold rules, never by per-archetype types.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::piece::{PieceKind, Side};

/// Trait score at or above which a trait counts as "high".
pub const HIGH_TRAIT: u8 = 7;

/// Trait score at or below which a trait counts as "low".
pub const LOW_TRAIT: u8 = 3;

const MAX_TRAIT: u8 = 10;

/// Behavioural trait scores, each in `0..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traits {
    pub aggression: u8,
    pub caution: u8,
    pub humor: u8,
    pub eloquence: u8,
}

impl Traits {
    /// Build trait scores, clamping anything above 10.
    pub fn new(aggression: u8, caution: u8, humor: u8, eloquence: u8) -> Self {
        Self {
            aggression: aggression.min(MAX_TRAIT),
            caution: caution.min(MAX_TRAIT),
            humor: humor.min(MAX_TRAIT),
            eloquence: eloquence.min(MAX_TRAIT),
        }
    }

    pub fn is_aggressive(&self) -> bool {
        self.aggression >= HIGH_TRAIT
    }
}

impl Default for Traits {
    fn default() -> Self {
        Self::new(5, 5, 5, 5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    pub piece_kind: PieceKind,
    pub side: Side,
    pub display_name: String,
    pub archetype: String,
    pub speaking_style: String,
    pub backstory: String,
    pub traits: Traits,
    #[serde(skip)]
    system_prompt: OnceLock<String>,
}

impl Personality {
    pub fn new(piece_kind: PieceKind, side: Side, display_name: impl Into<String>) -> Self {
        Self {
            piece_kind,
            side,
            display_name: display_name.into(),
            archetype: String::new(),
            speaking_style: String::new(),
            backstory: String::new(),
            traits: Traits::default(),
            system_prompt: OnceLock::new(),
        }
    }

    pub fn with_archetype(mut self, archetype: impl Into<String>) -> Self {
        self.archetype = archetype.into();
        self
    }

    pub fn with_speaking_style(mut self, style: impl Into<String>) -> Self {
        self.speaking_style = style.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }

    /// Name shown to players, falling back to "White Knight" style labels.
    pub fn name(&self) -> String {
        if self.display_name.trim().is_empty() {
            format!("{} {}", self.side, self.piece_kind)
        } else {
            self.display_name.clone()
        }
    }

    /// Identity and trait guidance sentences.
    pub fn prompt_context(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.display_name.is_empty() {
            parts.push(format!("Your name is {}.", self.display_name));
        }
        if !self.archetype.is_empty() {
            parts.push(format!("You embody the archetype of a {}.", self.archetype));
        }
        if !self.speaking_style.is_empty() {
            parts.push(format!("You speak in a {} manner.", self.speaking_style));
        }
        if !self.backstory.is_empty() {
            parts.push(format!("Your backstory: {}", self.backstory));
        }

        let t = &self.traits;
        push_trait(
            &mut parts,
            t.aggression,
            "You are aggressive and eager for battle.",
            "You prefer peaceful resolutions when possible.",
        );
        push_trait(
            &mut parts,
            t.caution,
            "You are very cautious and think defensively.",
            "You are bold and take risks readily.",
        );
        push_trait(
            &mut parts,
            t.humor,
            "You enjoy making jokes and witty remarks.",
            "You are serious and rarely joke.",
        );
        push_trait(
            &mut parts,
            t.eloquence,
            "You speak eloquently and at length.",
            "You are terse and to the point.",
        );

        if parts.is_empty() {
            "You have a balanced personality.".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Character instructions for text generation, built once and reused for
    /// every call made in this personality's voice.
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.get_or_init(|| {
            let mut prompt = String::new();
            let _ = writeln!(
                prompt,
                "You are a {} chess piece on the {} side.",
                self.piece_kind.as_str(),
                self.side.as_str()
            );
            let _ = writeln!(prompt, "{}", self.prompt_context());
            prompt.push_str(
                "\nYou provide brief, in-character commentary during a chess game. Your commentary should:\n\
                 1. Stay in character based on your personality\n\
                 2. Be brief (1-2 sentences max)\n\
                 3. Reference the game situation appropriately\n\
                 4. Never break character or mention you're an AI\n\
                 5. Show personality through word choice and tone\n\n\
                 Remember: You ARE this chess piece, speaking about the game from your perspective on the board.",
            );
            prompt
        })
    }
}

fn push_trait(parts: &mut Vec<String>, score: u8, high: &str, low: &str) {
    if score >= HIGH_TRAIT {
        parts.push(high.to_string());
    } else if score <= LOW_TRAIT {
        parts.push(low.to_string());
    }
}

/// Catalog resolving exactly one personality per (piece, side) pair.
///
/// Cloning is cheap: entries are shared `Arc`s, so a match can take its own
/// copy, apply overrides, and tear it down without touching anyone else's.
#[derive(Debug, Clone)]
pub struct PersonalityRegistry {
    entries: [[Arc<Personality>; 2]; 6],
}

impl PersonalityRegistry {
    /// The twelve stock personalities.
    pub fn standard() -> Self {
        let entry = |kind: PieceKind, side: Side| Arc::new(default_personality(kind, side));
        let pair = |kind: PieceKind| [entry(kind, Side::White), entry(kind, Side::Black)];
        Self {
            entries: [
                pair(PieceKind::King),
                pair(PieceKind::Queen),
                pair(PieceKind::Rook),
                pair(PieceKind::Bishop),
                pair(PieceKind::Knight),
                pair(PieceKind::Pawn),
            ],
        }
    }

    pub fn get(&self, kind: PieceKind, side: Side) -> &Arc<Personality> {
        &self.entries[kind.index()][side.index()]
    }

    /// Replace the personality for the pair named by `personality` itself.
    pub fn set(&mut self, personality: Personality) -> Arc<Personality> {
        let shared = Arc::new(personality);
        self.entries[shared.piece_kind.index()][shared.side.index()] = shared.clone();
        shared
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Personality>> {
        self.entries.iter().flat_map(|pair| pair.iter())
    }
}

impl Default for PersonalityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn default_personality(kind: PieceKind, side: Side) -> Personality {
    let (name, archetype, style, traits, backstory) = match (kind, side) {
        (PieceKind::King, Side::White) => (
            "King Aldric",
            "wise ruler",
            "regal and measured",
            Traits::new(3, 8, 3, 8),
            "An aging monarch who has seen many battles.",
        ),
        (PieceKind::Queen, Side::White) => (
            "Queen Seraphina",
            "fierce warrior queen",
            "commanding yet graceful",
            Traits::new(8, 4, 4, 7),
            "The most powerful piece, and she knows it.",
        ),
        (PieceKind::Rook, Side::White) => (
            "Tower Guard",
            "stalwart defender",
            "direct and military",
            Traits::new(5, 7, 2, 3),
            "A fortress made manifest, unwavering in duty.",
        ),
        (PieceKind::Bishop, Side::White) => (
            "Bishop Luminos",
            "cunning advisor",
            "scholarly and cryptic",
            Traits::new(4, 6, 5, 9),
            "Sees the board from angles others miss.",
        ),
        (PieceKind::Knight, Side::White) => (
            "Sir Galahad",
            "chivalrous knight",
            "honorable and brave",
            Traits::new(7, 3, 5, 5),
            "Leaps into danger where others fear to tread.",
        ),
        (PieceKind::Pawn, Side::White) => (
            "Footsoldier",
            "humble soldier",
            "simple and earnest",
            Traits::new(4, 5, 6, 3),
            "Dreams of crossing the battlefield and becoming something more.",
        ),
        (PieceKind::King, Side::Black) => (
            "King Malachar",
            "cunning strategist",
            "cold and calculating",
            Traits::new(4, 9, 2, 7),
            "A king who trusts no one and plans ten moves ahead.",
        ),
        (PieceKind::Queen, Side::Black) => (
            "Queen Nyx",
            "shadow assassin",
            "mysterious and deadly",
            Traits::new(9, 3, 3, 6),
            "Strikes from the darkness with lethal precision.",
        ),
        (PieceKind::Rook, Side::Black) => (
            "Dark Tower",
            "silent sentinel",
            "ominous and sparse",
            Traits::new(6, 6, 1, 2),
            "An ancient fortress with secrets in its stones.",
        ),
        (PieceKind::Bishop, Side::Black) => (
            "Bishop Umbra",
            "dark oracle",
            "prophetic and unsettling",
            Traits::new(5, 5, 4, 8),
            "Whispers prophecies of doom to enemies.",
        ),
        (PieceKind::Knight, Side::Black) => (
            "The Black Rider",
            "fearsome raider",
            "wild and intimidating",
            Traits::new(8, 2, 4, 4),
            "Chaos incarnate, leaping where least expected.",
        ),
        (PieceKind::Pawn, Side::Black) => (
            "Dark Infantry",
            "devoted servant",
            "grim but determined",
            Traits::new(5, 4, 3, 3),
            "Marches forward knowing sacrifice may await.",
        ),
    };

    Personality::new(kind, side, name)
        .with_archetype(archetype)
        .with_speaking_style(style)
        .with_traits(traits)
        .with_backstory(backstory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_pair_resolves_to_its_own_personality() {
        let registry = PersonalityRegistry::standard();
        for kind in PieceKind::ALL {
            for side in [Side::White, Side::Black] {
                let p = registry.get(kind, side);
                assert_eq!(p.piece_kind, kind);
                assert_eq!(p.side, side);
                assert!(!p.display_name.is_empty());
            }
        }
        assert_eq!(registry.iter().count(), 12);
    }

    #[test]
    fn test_traits_are_clamped() {
        let t = Traits::new(42, 11, 10, 0);
        assert_eq!(t, Traits::new(10, 10, 10, 0));
    }

    #[test]
    fn test_prompt_context_uses_thresholds() {
        let registry = PersonalityRegistry::standard();
        let queen = registry.get(PieceKind::Queen, Side::Black);
        let ctx = queen.prompt_context();
        assert!(ctx.contains("Your name is Queen Nyx."));
        assert!(ctx.contains("aggressive and eager for battle"));
        assert!(ctx.contains("bold and take risks"));
        assert!(!ctx.contains("eloquently"));

        let blank = Personality::new(PieceKind::Pawn, Side::White, "");
        assert_eq!(blank.prompt_context(), "You have a balanced personality.");
        assert_eq!(blank.name(), "White Pawn");
    }

    #[test]
    fn test_system_prompt_is_in_character() {
        let registry = PersonalityRegistry::standard();
        let knight = registry.get(PieceKind::Knight, Side::White);
        let prompt = knight.system_prompt();
        assert!(prompt.starts_with("You are a knight chess piece on the white side."));
        assert!(prompt.contains("Sir Galahad"));
        assert!(prompt.contains("Never break character or mention you're an AI"));
        // Cached: same allocation on every call.
        assert!(std::ptr::eq(prompt, knight.system_prompt()));
    }

    #[test]
    fn test_override_replaces_only_its_pair() {
        let mut registry = PersonalityRegistry::standard();
        let custom = Personality::new(PieceKind::Rook, Side::White, "Old Bastion")
            .with_traits(Traits::new(9, 1, 1, 1));
        registry.set(custom);

        assert_eq!(registry.get(PieceKind::Rook, Side::White).display_name, "Old Bastion");
        assert_eq!(registry.get(PieceKind::Rook, Side::Black).display_name, "Dark Tower");
    }
}
