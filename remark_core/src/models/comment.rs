use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::prelude::*;
use crate::error::CommentsError;
use crate::ids::{CommentId, ROOT_ID};

/// Upper bound on the message body, in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

pub const VERB_REACTION: &str = "reaction";
pub const VERB_REACTION_DELETED: &str = "reaction_deleted";

/// Actor identity written into rows when an account is scrubbed.
pub const DELETED_USER: &str = "deleted_users";

/// A single discussion node (or reaction) as handed to and from callers.
///
/// Ids are opaque strings on this surface: `""` means the comment was never
/// saved, `"0"` is the root parent reference. Every setter validates before
/// mutating, so a `Comment` in hand always satisfies the field invariants;
/// completeness (actor, object, verb, message all present) is only enforced
/// at save time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    id: String,
    parent_id: String,
    topmost_parent_id: String,
    children_count: i32,
    message: String,
    verb: String,
    actor_type: String,
    actor_id: String,
    object_type: String,
    object_id: String,
    creation_timestamp: Option<DateTime<Utc>>,
    latest_child_timestamp: Option<DateTime<Utc>>,
    expire_date: Option<DateTime<Utc>>,
    reference_id: Option<String>,
    meta_data: HashMap<String, String>,
    /// Ordered `(symbol, count)` summary; only populated on rows that are
    /// reaction parents.
    reactions: Vec<(String, u32)>,
}

impl Default for Comment {
    fn default() -> Self {
        Comment {
            id: String::new(),
            parent_id: ROOT_ID.to_string(),
            topmost_parent_id: ROOT_ID.to_string(),
            children_count: 0,
            message: String::new(),
            verb: String::new(),
            actor_type: String::new(),
            actor_id: String::new(),
            object_type: String::new(),
            object_id: String::new(),
            creation_timestamp: None,
            latest_child_timestamp: None,
            expire_date: None,
            reference_id: None,
            meta_data: HashMap::new(),
            reactions: Vec::new(),
        }
    }
}

fn check_parent_ref(id: &str) -> Result<(), CommentsError> {
    if id == ROOT_ID || id.parse::<i64>().map(|v| v > 0).unwrap_or(false) {
        Ok(())
    } else {
        Err(CommentsError::InvalidArgument(
            "parent ids must be \"0\" or a stored comment id",
        ))
    }
}

fn check_role(type_: &str, id: &str) -> Result<(), CommentsError> {
    if type_.is_empty() || id.is_empty() {
        return Err(CommentsError::InvalidArgument(
            "role parameters must not be empty",
        ));
    }
    Ok(())
}

impl Comment {
    pub fn new(
        actor_type: &str,
        actor_id: &str,
        object_type: &str,
        object_id: &str,
    ) -> Result<Self, CommentsError> {
        let mut comment = Comment::default();
        comment.set_actor(actor_type, actor_id)?;
        comment.set_object(object_type, object_id)?;
        Ok(comment)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Assigns the row identity. The id may be set once and reset back to
    /// `""`; flipping a non-empty id to a different non-empty one is the
    /// one mutation this type refuses outright.
    pub fn set_id(&mut self, id: &str) -> Result<(), CommentsError> {
        if !self.id.is_empty() && !id.is_empty() && self.id != id {
            return Err(CommentsError::IllegalIdentityChange);
        }
        self.id = id.to_string();
        Ok(())
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn set_parent_id(&mut self, parent_id: &str) -> Result<(), CommentsError> {
        check_parent_ref(parent_id)?;
        self.parent_id = parent_id.to_string();
        Ok(())
    }

    pub fn topmost_parent_id(&self) -> &str {
        &self.topmost_parent_id
    }

    pub fn set_topmost_parent_id(&mut self, id: &str) -> Result<(), CommentsError> {
        check_parent_ref(id)?;
        self.topmost_parent_id = id.to_string();
        Ok(())
    }

    pub fn children_count(&self) -> i32 {
        self.children_count
    }

    pub fn set_children_count(&mut self, count: i32) -> Result<(), CommentsError> {
        if count < 0 {
            return Err(CommentsError::InvalidArgument(
                "children count cannot be negative",
            ));
        }
        self.children_count = count;
        Ok(())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: &str) -> Result<(), CommentsError> {
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(CommentsError::MessageTooLong {
                limit: MAX_MESSAGE_LENGTH,
            });
        }
        self.message = message.to_string();
        Ok(())
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The discriminator is free-form; emptiness is only rejected at save
    /// time so callers can build a comment up field by field.
    pub fn set_verb(&mut self, verb: &str) {
        self.verb = verb.to_string();
    }

    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn set_actor(&mut self, actor_type: &str, actor_id: &str) -> Result<(), CommentsError> {
        check_role(actor_type, actor_id)?;
        self.actor_type = actor_type.to_string();
        self.actor_id = actor_id.to_string();
        Ok(())
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn set_object(&mut self, object_type: &str, object_id: &str) -> Result<(), CommentsError> {
        check_role(object_type, object_id)?;
        self.object_type = object_type.to_string();
        self.object_id = object_id.to_string();
        Ok(())
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.creation_timestamp
    }

    pub fn set_creation_timestamp(&mut self, at: DateTime<Utc>) {
        self.creation_timestamp = Some(at);
    }

    pub fn latest_child_timestamp(&self) -> Option<DateTime<Utc>> {
        self.latest_child_timestamp
    }

    pub fn set_latest_child_timestamp(&mut self, at: Option<DateTime<Utc>>) {
        self.latest_child_timestamp = at;
    }

    pub fn expire_date(&self) -> Option<DateTime<Utc>> {
        self.expire_date
    }

    pub fn set_expire_date(&mut self, at: Option<DateTime<Utc>>) {
        self.expire_date = at;
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.reference_id.as_deref()
    }

    pub fn set_reference_id(&mut self, reference_id: Option<String>) {
        self.reference_id = reference_id;
    }

    pub fn meta_data(&self) -> &HashMap<String, String> {
        &self.meta_data
    }

    pub fn set_meta_data(&mut self, meta_data: HashMap<String, String>) {
        self.meta_data = meta_data;
    }

    pub fn reactions(&self) -> &[(String, u32)] {
        &self.reactions
    }

    /// Mention tokens found in the message, first occurrence first, each
    /// (kind, id) pair reported once. When `author` is given, a plain user
    /// mention of that login is dropped so people do not get notified about
    /// talking to themselves.
    pub fn mentions(&self, author: Option<&str>) -> Vec<Mention> {
        extract_mentions(&self.message, author)
    }

    /// Rehydrates the caller-facing value from a stored row.
    pub(crate) fn from_model(row: CommentModel) -> Self {
        Comment {
            id: row.id.to_string(),
            parent_id: row.parent_id.to_string(),
            topmost_parent_id: row.topmost_parent_id.to_string(),
            children_count: row.children_count,
            message: row.message,
            verb: row.verb,
            actor_type: row.actor_type,
            actor_id: row.actor_id,
            object_type: row.object_type,
            object_id: row.object_id,
            creation_timestamp: Some(row.creation_timestamp),
            latest_child_timestamp: row.latest_child_timestamp,
            expire_date: row.expire_date,
            reference_id: row.reference_id,
            meta_data: row
                .meta_data
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
            reactions: row
                .reactions
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_default(),
        }
    }

    /// Row image of this comment. The id stays `NotSet` for unsaved
    /// comments so the database assigns it.
    pub(crate) fn to_active_model(&self) -> Result<CommentActiveModel, CommentsError> {
        let meta_data = if self.meta_data.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&self.meta_data).map_err(|_| {
                CommentsError::InvalidArgument("meta data must be JSON representable")
            })?)
        };

        Ok(CommentActiveModel {
            id: if self.id.is_empty() {
                NotSet
            } else {
                Set(CommentId::parse_str(&self.id)?)
            },
            parent_id: Set(CommentId::from(self.parent_id.parse::<i64>().unwrap_or(0))),
            topmost_parent_id: Set(CommentId::from(
                self.topmost_parent_id.parse::<i64>().unwrap_or(0),
            )),
            children_count: Set(self.children_count),
            actor_type: Set(self.actor_type.clone()),
            actor_id: Set(self.actor_id.clone()),
            object_type: Set(self.object_type.clone()),
            object_id: Set(self.object_id.clone()),
            message: Set(self.message.clone()),
            verb: Set(self.verb.clone()),
            creation_timestamp: Set(self.creation_timestamp.unwrap_or_else(Utc::now)),
            latest_child_timestamp: Set(self.latest_child_timestamp),
            expire_date: Set(self.expire_date),
            reference_id: Set(self.reference_id.clone()),
            meta_data: Set(meta_data),
            // The summary column is maintained by the reaction aggregation,
            // never written from the caller-facing value.
            reactions: NotSet,
        })
    }
}

/// One node of the reply tree: the comment plus one expanded level of
/// children (grandchildren stay unexpanded).
#[derive(Clone, Debug, Serialize)]
pub struct CommentTree {
    pub comment: Comment,
    pub replies: Vec<CommentTree>,
}

/// Kinds a mention token can resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    User,
    Group,
    Guest,
    FederatedGroup,
    FederatedTeam,
    FederatedUser,
    Email,
}

impl MentionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionKind::User => "user",
            MentionKind::Group => "group",
            MentionKind::Guest => "guest",
            MentionKind::FederatedGroup => "federated_group",
            MentionKind::FederatedTeam => "federated_team",
            MentionKind::FederatedUser => "federated_user",
            MentionKind::Email => "email",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub kind: MentionKind,
    pub id: String,
}

/// Kind prefixes recognized inside the quoted mention form.
const RICH_MENTION_PREFIXES: &[(&str, MentionKind)] = &[
    ("group/", MentionKind::Group),
    ("guest/", MentionKind::Guest),
    ("federated_group/", MentionKind::FederatedGroup),
    ("federated_team/", MentionKind::FederatedTeam),
    ("federated_user/", MentionKind::FederatedUser),
    ("email/", MentionKind::Email),
];

fn parse_quoted_mention(body: &str) -> Mention {
    for (prefix, kind) in RICH_MENTION_PREFIXES {
        if let Some(id) = body.strip_prefix(prefix) {
            return Mention {
                kind: *kind,
                id: id.to_string(),
            };
        }
    }
    Mention {
        kind: MentionKind::User,
        id: body.to_string(),
    }
}

fn extract_mentions(message: &str, author: Option<&str>) -> Vec<Mention> {
    // Two shapes: @"quoted, possibly kind-prefixed" and a bare @token. The
    // leading group pins the @ to the start of the message or to a character
    // that cannot be part of a bare token, which keeps mail@example.org from
    // producing a mention of example.org.
    let pattern = Regex::new(r#"(?:^|[^A-Za-z0-9_.@-])@(?:"([^"]+)"|([A-Za-z0-9_.@-]+))"#)
        .expect("valid regex");

    let mut seen: HashSet<(MentionKind, String)> = HashSet::new();
    let mut mentions = Vec::new();
    for caps in pattern.captures_iter(message) {
        let mention = match caps.get(1) {
            Some(quoted) => parse_quoted_mention(quoted.as_str()),
            None => Mention {
                kind: MentionKind::User,
                id: caps[2].to_string(),
            },
        };
        if mention.id.is_empty() {
            continue;
        }
        if mention.kind == MentionKind::User && author == Some(mention.id.as_str()) {
            continue;
        }
        if seen.insert((mention.kind, mention.id.clone())) {
            mentions.push(mention);
        }
    }
    mentions
}
