//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Username,
    Email,
    PasswordHash,
    PasswordSalt,
    AvatarUrl,
    CreatedAt,
}

#[derive(Iden)]
pub enum RefreshTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Lists {
    Table,
    Id,
    Name,
    OwnerId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum ListMembers {
    Table,
    ListId,
    UserId,
    Role,
    CreatedAt,
}

#[derive(Iden)]
pub enum Todos {
    Table,
    Id,
    ListId,
    Text,
    Done,
    CreatedAt,
}

#[derive(Iden)]
pub enum ListInvites {
    Table,
    Id,
    ListId,
    InvitedUserId,
    InvitedBy,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum PushSubscriptions {
    Table,
    UserId,
    Endpoint,
    #[iden = "p256dh"]
    P256dh,
    Auth,
    CreatedAt,
}

#[derive(Iden)]
pub enum Presence {
    Table,
    UserId,
    ListId,
    LastSeen,
    DisplayName,
    AvatarUrl,
}

#[derive(Iden)]
pub enum NotificationCooldowns {
    Table,
    ListId,
    UserId,
    LastNotifiedAt,
}
