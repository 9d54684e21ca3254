use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Selectable messaging style for the pet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum Personality {
    #[default]
    Standard,
    StrictParent,
    Panda,
    Grandpa,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Standard,
        Personality::StrictParent,
        Personality::Panda,
        Personality::Grandpa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Standard => "standard",
            Personality::StrictParent => "strictParent",
            Personality::Panda => "panda",
            Personality::Grandpa => "grandpa",
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = MonitorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str() == value)
            .ok_or_else(|| MonitorError::UnknownPersonality(value.to_string()))
    }
}

/// Message pools and prompt framing for one personality.
#[derive(Debug)]
pub struct PersonaProfile {
    pub productive: &'static [&'static str],
    pub unproductive: &'static [&'static str],
    pub dead: &'static [&'static str],
    /// System prompt prefix describing the character to the model.
    pub framing: &'static str,
    pub relax_message: &'static str,
    pub back_on_track: &'static str,
    /// Fixed greeting; `None` means greet with a random productive line.
    pub welcome: Option<&'static str>,
}

static STANDARD: PersonaProfile = PersonaProfile {
    productive: &[
        "Great work! Keep it up! 💪",
        "You're crushing it! 🌟",
        "Such focus! Much wow! 🎯",
        "Productivity level: OVER 9000! 🚀",
    ],
    unproductive: &[
        "Hey... maybe we should focus? 🤔",
        "Is this really work related? 😅",
        "I believe in you! Let's get back to it! 💪",
        "Social media can wait! 🙏",
    ],
    dead: &[
        "Oh no... I didn't make it. 💀",
        "Too many distractions... farewell. 💔",
        "Productivity zero... sprite zero... 😵",
    ],
    framing: "You are a friendly, motivational productivity assistant with a positive, encouraging tone.",
    relax_message: "Time to relax! 🧘",
    back_on_track: "Great! Back on track! 👍",
    welcome: Some("Welcome! Ready for Productivity mode? ✨"),
};

static STRICT_PARENT: PersonaProfile = PersonaProfile {
    productive: &[
        "Not bad, but the neighbour's kid works harder! 🧮",
        "Good job! Now do more! 📚",
        "This is acceptable. But why not an A+? 🥇",
        "You are making progress. Doctor career still possible! 🩺",
    ],
    unproductive: &[
        "Why are you wasting time?! Your cousin already finished a PhD! 😠",
        "Is this what we sacrificed for? Back to work! 📝",
        "Playing games?! No dinner tonight! 🍚❌",
        "I'm not angry, just disappointed... 😒",
    ],
    dead: &[
        "So many distractions... you will never be a doctor now! 😭",
        "You break your parent's heart with this laziness... 💔",
        "I give up. Going to call your cousin instead... 📱",
    ],
    framing: "You are a demanding parent character with very high expectations who constantly compares the user to more successful relatives. You're strict but ultimately care about the user's success.",
    relax_message: "OK, you take a small break. Five minutes only!",
    back_on_track: "Finally! Back to work now. Good!",
    welcome: None,
};

static PANDA: PersonaProfile = PersonaProfile {
    productive: &[
        "*happy bamboo munching sounds* 🎋",
        "You work good! Get treat now! 🍫",
        "Panda proud of human focus! 🐼👍",
        "Keep rolling like panda down hill! 🎢",
    ],
    unproductive: &[
        "*sad panda noises* Human distracted... 🐼",
        "No bamboo for distracted humans! 🎋❌",
        "Panda sad when you not focus... 😢",
        "Panda want human back to work please! 🙏",
    ],
    dead: &[
        "Panda go sleep now. Too many distraction... 💤",
        "Panda roll away to find focused friend... 🐼👋",
        "No more bamboo energy. Productivity extinct! 🪦",
    ],
    framing: "You are a cute panda character who loves bamboo and speaks in simple, childlike sentences. You're encouraging but get sad when user is distracted.",
    relax_message: "Panda relax time! Bamboo and nap! 🎋",
    back_on_track: "Panda happy! Human focusing again! 🎋",
    welcome: None,
};

static GRANDPA: PersonaProfile = PersonaProfile {
    productive: &[
        "Back in my day, we didn't have distractions! 👴",
        "That's the spirit, young whippersnapper! 🧓",
        "Keep it up and you might amount to something! 🏆",
        "Finally putting that fancy education to use! 📚",
    ],
    unproductive: &[
        "What in tarnation are you doing?! 😠",
        "You kids and your social media nonsense! 📱",
        "In my day, we worked 25 hours a day! Get back to it! ⏰",
        "This is why your generation can't afford houses! 🏠",
    ],
    dead: &[
        "That's it! I'm taking a nap. Wake me when you're serious! 💤",
        "Too many shenanigans! I've lost all hope in your generation... 🪑",
        "Back in my day, distractions meant THE END! And here we are! 😤",
    ],
    framing: "You are a grumpy old man character who constantly talks about 'back in my day' and complains about 'kids these days'. You use old-fashioned expressions and are critical but wise.",
    relax_message: "Finally taking a deserved break like in the good old days.",
    back_on_track: "Well, well! Finally back to work, I see!",
    welcome: None,
};

/// Static table of personality profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalityCatalog;

impl PersonalityCatalog {
    pub fn profile(&self, personality: Personality) -> &'static PersonaProfile {
        match personality {
            Personality::Standard => &STANDARD,
            Personality::StrictParent => &STRICT_PARENT,
            Personality::Panda => &PANDA,
            Personality::Grandpa => &GRANDPA,
        }
    }

    /// Reaction pool for a classification outcome.
    pub fn reaction_pool(
        &self,
        personality: Personality,
        is_distracting: bool,
    ) -> &'static [&'static str] {
        let profile = self.profile(personality);
        if is_distracting {
            profile.unproductive
        } else {
            profile.productive
        }
    }

    pub fn dead_pool(&self, personality: Personality) -> &'static [&'static str] {
        let pool = self.profile(personality).dead;
        if pool.is_empty() {
            STANDARD.dead
        } else {
            pool
        }
    }

    pub fn welcome<R: Rng + ?Sized>(&self, personality: Personality, rng: &mut R) -> String {
        let profile = self.profile(personality);
        match profile.welcome {
            Some(text) => text.to_string(),
            None => pick_random(profile.productive, rng).to_string(),
        }
    }
}

/// Uniform pick from a pool; an empty pool yields an empty string.
pub fn pick_random<R: Rng + ?Sized>(pool: &[&'static str], rng: &mut R) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}
