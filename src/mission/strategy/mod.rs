//! Strategy families. Each family is one trait with one method; every concrete
//! variant is its own type and gets registered in a [`crate::mission::resolver`]
//! registry.

pub mod award;
pub mod progress;

pub use award::{AwardStrategy, CurrencyAwardStrategy, ExperienceAwardStrategy, TitleAwardStrategy};
pub use progress::{
    ActivityStats, CompletedMissionsStrategy, FriendCountStrategy, InteractionCountStrategy,
    LevelReachedStrategy, OwnedItemsStrategy, ProgressStrategy,
};
