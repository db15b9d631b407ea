//! 请求上下文
//!
//! 每个命令显式携带调用者身份，替代全局会话状态

use serde::{Deserialize, Serialize};

use crate::application::error::ApplicationError;
use crate::domain::book::Book;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "member" => Some(UserRole::Member),
            _ => None,
        }
    }
}

/// 调用者上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: String,
    pub role: UserRole,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, UserRole::Admin)
    }

    pub fn member(user_id: impl Into<String>) -> Self {
        Self::new(user_id, UserRole::Member)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 普通成员受额度限制，管理员不受限
    pub fn is_quota_bound(&self) -> bool {
        self.role == UserRole::Member
    }

    pub fn ensure_admin(&self) -> Result<(), ApplicationError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApplicationError::forbidden("administrator role required"))
        }
    }

    /// 书籍所有者或管理员
    pub fn ensure_can_access(&self, book: &Book) -> Result<(), ApplicationError> {
        if self.is_admin() || book.owner_id == self.user_id {
            Ok(())
        } else {
            Err(ApplicationError::forbidden(format!(
                "book {} belongs to another user",
                book.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookContext, BookTitle, BookType, Niche};

    #[test]
    fn test_access_rules() {
        let book = Book::new(
            "owner",
            BookTitle::new("Tides").unwrap(),
            BookType::Novel,
            Niche::Fantasy,
            BookContext::default(),
            false,
        )
        .unwrap();

        assert!(RequestContext::member("owner").ensure_can_access(&book).is_ok());
        assert!(RequestContext::admin("root").ensure_can_access(&book).is_ok());
        assert!(matches!(
            RequestContext::member("other").ensure_can_access(&book),
            Err(ApplicationError::Forbidden(_))
        ));
        assert!(RequestContext::member("owner").ensure_admin().is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(UserRole::from_str(" Admin "), Some(UserRole::Admin));
        assert_eq!(UserRole::from_str("member"), Some(UserRole::Member));
        assert_eq!(UserRole::from_str("guest"), None);
    }
}
