diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        role -> Text,
        is_active -> Bool,
        profile_data -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        description -> Nullable<Text>,
        slug -> Text,
        created_by -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    content (id) {
        id -> Integer,
        title -> Text,
        content_type -> Text,
        content_url -> Nullable<Text>,
        description -> Nullable<Text>,
        body -> Nullable<Text>,
        thumbnail_url -> Nullable<Text>,
        status -> Text,
        flag_reason -> Nullable<Text>,
        tags -> Text,
        author_id -> Integer,
        category_id -> Integer,
        approved_by -> Nullable<Integer>,
        views_count -> Integer,
        likes_count -> Integer,
        dislikes_count -> Integer,
        created_at -> Timestamp,
        updated_at -> Timestamp,
        published_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    comments (id) {
        id -> Integer,
        comment_text -> Text,
        content_id -> Integer,
        user_id -> Integer,
        parent_comment_id -> Nullable<Integer>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    content_reviews (id) {
        id -> Integer,
        content_id -> Integer,
        user_id -> Integer,
        review_type -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    subscriptions (id) {
        id -> Integer,
        user_id -> Integer,
        category_id -> Integer,
        notify_on_new_content -> Bool,
        created_at -> Timestamp,
    }
}

diesel::table! {
    wishlists (id) {
        id -> Integer,
        user_id -> Integer,
        content_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::joinable!(categories -> users (created_by));
diesel::joinable!(content -> categories (category_id));
diesel::joinable!(comments -> content (content_id));
diesel::joinable!(comments -> users (user_id));
diesel::joinable!(content_reviews -> content (content_id));
diesel::joinable!(subscriptions -> categories (category_id));
diesel::joinable!(wishlists -> content (content_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    categories,
    content,
    comments,
    content_reviews,
    subscriptions,
    wishlists,
);
