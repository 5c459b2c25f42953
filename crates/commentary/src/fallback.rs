//! Template commentary used when no text generation is available or a call
//! fails. Family choice follows the speaker's role and traits; the line within
//! a family comes from a seeded RNG.

use chess_core::{MoveRecord, Personality, PieceKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::prompt::{EndOutcome, SpeakerRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFamily {
    Lament,
    Threatened,
    Triumphant,
    Reluctant,
    Checking,
    Standard,
    Alarm,
    Opening,
    Victory,
    Defeat,
    Draw,
}

const LAMENT: &[&str] = &[
    "I fall, but our cause endures!",
    "Avenge me, comrades!",
    "This is not the end of our story...",
    "A worthy foe. Remember me.",
];

const THREATENED: &[&str] = &[
    "They dare threaten me?!",
    "A temporary inconvenience...",
    "We must address this threat.",
];

const TRIUMPHANT: &[&str] = &[
    "Victory! Another enemy falls!",
    "That's what happens when you stand in my way!",
    "One less foe to worry about!",
];

const RELUCTANT: &[&str] = &[
    "A necessary sacrifice on their part.",
    "The position demanded this exchange.",
    "Sometimes pieces must fall.",
];

const CHECKING: &[&str] = &[
    "Check! The king trembles!",
    "Your majesty should watch their back!",
    "The hunt is on!",
];

const STANDARD: &[&str] = &[
    "Onward!",
    "A solid move.",
    "The plan unfolds.",
    "Position secured.",
];

const ALARM: &[&str] = &["Our king is threatened!"];

const OPENING: &[&str] = &[
    "Let the battle begin!",
    "May the better side prevail.",
    "Take your positions. The game is afoot.",
];

const VICTORY: &[&str] = &[
    "Victory is ours!",
    "As it was always meant to be.",
    "A glorious triumph for our side!",
];

const DEFEAT: &[&str] = &[
    "We shall return stronger.",
    "Defeat... this time.",
    "A bitter end to a hard-fought battle.",
];

const DRAW: &[&str] = &[
    "Neither side yields today.",
    "An honorable standstill.",
    "We live to fight another day.",
];

impl TemplateFamily {
    pub fn templates(&self) -> &'static [&'static str] {
        match self {
            TemplateFamily::Lament => LAMENT,
            TemplateFamily::Threatened => THREATENED,
            TemplateFamily::Triumphant => TRIUMPHANT,
            TemplateFamily::Reluctant => RELUCTANT,
            TemplateFamily::Checking => CHECKING,
            TemplateFamily::Standard => STANDARD,
            TemplateFamily::Alarm => ALARM,
            TemplateFamily::Opening => OPENING,
            TemplateFamily::Victory => VICTORY,
            TemplateFamily::Defeat => DEFEAT,
            TemplateFamily::Draw => DRAW,
        }
    }

    fn tag(&self) -> u64 {
        *self as u64 + 1
    }
}

/// Pick the family for a speaker. `record` is `None` for game start and end.
pub fn family_for(
    role: SpeakerRole,
    personality: &Personality,
    speaker_kind: PieceKind,
    record: Option<&MoveRecord>,
) -> TemplateFamily {
    match role {
        SpeakerRole::Captured => TemplateFamily::Lament,
        SpeakerRole::CheckedKing if speaker_kind == PieceKind::King => TemplateFamily::Threatened,
        SpeakerRole::CheckedKing => TemplateFamily::Alarm,
        SpeakerRole::Mover => match record {
            Some(r) if r.is_capture() && personality.traits.is_aggressive() => {
                TemplateFamily::Triumphant
            }
            Some(r) if r.is_capture() => TemplateFamily::Reluctant,
            Some(r) if r.is_check || r.is_checkmate => TemplateFamily::Checking,
            _ => TemplateFamily::Standard,
        },
        SpeakerRole::GameStart => TemplateFamily::Opening,
        SpeakerRole::GameEnd(EndOutcome::Won) => TemplateFamily::Victory,
        SpeakerRole::GameEnd(EndOutcome::Lost) => TemplateFamily::Defeat,
        SpeakerRole::GameEnd(EndOutcome::Drawn) => TemplateFamily::Draw,
    }
}

// splitmix64 finaliser
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for one speaker slot of one ply. Independent of call order.
pub fn slot_seed(engine_seed: u64, ply: usize, slot: usize, family: TemplateFamily) -> u64 {
    [ply as u64, slot as u64, family.tag()]
        .into_iter()
        .fold(mix(engine_seed), |acc, part| mix(acc ^ part))
}

pub fn pick(family: TemplateFamily, seed: u64) -> &'static str {
    let mut rng = StdRng::seed_from_u64(seed);
    family
        .templates()
        .choose(&mut rng)
        .copied()
        .unwrap_or("The game continues...")
}
