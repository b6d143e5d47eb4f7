use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")] // Les modèles sortent tels quels en JSON: camelCase côté client
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub full_name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)] // Ne jamais exposer le hash en JSON
    pub password_hash: String, // Format: pbkdf2:sha256:iterations$salt$hash
    pub role: String,                    // 'student', 'instructor', 'admin', 'approver'
    pub approval_status: Option<String>, // 'pending', 'approved', 'rejected' (NULL si non-instructeur)
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::courses::Entity")]
    Courses,

    #[sea_orm(has_many = "super::enrollments::Entity")]
    Enrollments,

    #[sea_orm(has_many = "super::purchase_history::Entity")]
    PurchaseHistory,
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courses.def()
    }
}

impl Related<super::enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::purchase_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_in_camel_case_without_hash() {
        let user = Model {
            id: 1,
            full_name: "Abebe Kebede".to_string(),
            email: "abebe@example.com".to_string(),
            password_hash: "pbkdf2:sha256:260000$salt$hash".to_string(),
            role: "instructor".to_string(),
            approval_status: Some("pending".to_string()),
            created_at: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("fullName").is_some());
        assert!(json.get("approvalStatus").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("full_name").is_none());
        // Le hash ne doit apparaître sous aucune des deux graphies
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }
}
