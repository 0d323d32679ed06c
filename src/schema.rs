// Storyloom schema - content tables for Diesel ORM

diesel::table! {
    schema_versions (id) {
        id -> Integer,
        version -> Text,
        name -> Text,
        features -> Text,
        introduced_at -> Text,
    }
}

diesel::table! {
    storylets (id) {
        id -> Text,
        title -> Text,
        description -> Text,
        content -> Text,
        arc_id -> Nullable<Text>,
        choices_json -> Text,
        triggers_json -> Text,
        effects_json -> Text,
        tags_json -> Text,
        priority -> Integer,
        estimated_play_time -> Nullable<Integer>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    story_arcs (id) {
        id -> Text,
        name -> Text,
        description -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    characters (id) {
        id -> Text,
        name -> Text,
        description -> Text,
        role -> Nullable<Text>,
        traits_json -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    clues (id) {
        id -> Text,
        name -> Text,
        description -> Text,
        category -> Nullable<Text>,
        discovered -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    minigame_attempts (id) {
        id -> Text,
        clue_id -> Text,
        kind -> Text,
        score -> Integer,
        success -> Bool,
        duration_ms -> BigInt,
        created_at -> Text,
    }
}
