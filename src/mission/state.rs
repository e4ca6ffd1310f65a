//! Starter content inserted by `missionctl init`.

use crate::mission::strategy::progress::{
    KEY_COMMENTS_WRITTEN, KEY_FRIENDS, KEY_LEVEL_REACHED, KEY_LIKES_GIVEN, KEY_MISSIONS_COMPLETED,
    KEY_OWNED_ITEMS, KEY_POSTS_PUBLISHED,
};
use crate::mission::types::{MissionRecord, MissionRequirement, RewardRecord, TitleRecord};

pub type SeedMission = (MissionRecord, Vec<MissionRequirement>, Vec<RewardRecord>);

pub fn seed_starter_titles() -> Vec<TitleRecord> {
    vec![
        TitleRecord::new("newcomer", "the Newcomer", "Published a first post"),
        TitleRecord::new("socialite", "the Socialite", "Built a circle of friends"),
        TitleRecord::new("collector", "the Collector", "Owns a varied collection"),
        TitleRecord::new("veteran", "the Veteran", "Completed many missions"),
    ]
}

pub fn seed_starter_missions() -> Vec<SeedMission> {
    let mut missions = Vec::new();

    missions.push((
        MissionRecord::new("first_steps", "First Steps", "Publish your first post"),
        vec![MissionRequirement::new("first_steps_post", "first_steps", KEY_POSTS_PUBLISHED, 1)
            .with_description("Publish a post")],
        vec![
            RewardRecord::title("first_steps_title", "first_steps", "newcomer"),
            RewardRecord::currency("first_steps_coins", "first_steps", 50, "First Steps reward"),
            RewardRecord::experience("first_steps_xp", "first_steps", 25),
        ],
    ));

    missions.push((
        MissionRecord::new(
            "social_butterfly",
            "Social Butterfly",
            "Make friends and join the conversation",
        ),
        vec![
            MissionRequirement::new("social_friends", "social_butterfly", KEY_FRIENDS, 5)
                .with_description("Add 5 friends"),
            MissionRequirement::new("social_comments", "social_butterfly", KEY_COMMENTS_WRITTEN, 10)
                .with_description("Write 10 comments"),
        ],
        vec![
            RewardRecord::title("social_title", "social_butterfly", "socialite"),
            RewardRecord::experience("social_xp", "social_butterfly", 100),
        ],
    ));

    missions.push((
        MissionRecord::new("appreciator", "Appreciator", "Like 25 pieces of content"),
        vec![MissionRequirement::new("appreciator_likes", "appreciator", KEY_LIKES_GIVEN, 25)
            .with_description("Give 25 likes")],
        vec![RewardRecord::currency("appreciator_coins", "appreciator", 20, "Appreciator reward")],
    ));

    missions.push((
        MissionRecord::new("collector", "Collector", "Own 10 different items"),
        vec![MissionRequirement::new("collector_items", "collector", KEY_OWNED_ITEMS, 10)
            .with_description("Own 10 distinct items")],
        vec![
            RewardRecord::title("collector_title", "collector", "collector"),
            RewardRecord::currency("collector_coins", "collector", 100, "Collector reward"),
        ],
    ));

    missions.push((
        MissionRecord::new("seasoned", "Seasoned", "Reach level 3 and finish three missions"),
        vec![
            MissionRequirement::new("seasoned_level", "seasoned", KEY_LEVEL_REACHED, 3)
                .with_description("Reach level 3"),
            MissionRequirement::new("seasoned_missions", "seasoned", KEY_MISSIONS_COMPLETED, 3)
                .with_description("Complete 3 missions"),
        ],
        vec![
            RewardRecord::title("seasoned_title", "seasoned", "veteran"),
            RewardRecord::experience("seasoned_xp", "seasoned", 250),
        ],
    ));

    missions
}
