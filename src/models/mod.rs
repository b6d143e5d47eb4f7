// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Utilisateurs (student, instructor, admin, approver)
//   - courses : Cours publiés par les instructeurs
//   - lessons : Leçons (vidéo ou quiz) rattachées à un cours
//   - lesson_access : Droit d'accès par (étudiant, leçon), unique par paire
//   - purchase_history : Journal append-only des tentatives de paiement
//   - payment_transactions : Transactions gateway (pending → paid/failed)
//   - enrollments : Inscriptions + progression des étudiants
//   - dto : Data Transfer Objects pour les réponses API
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les relations entre tables sont définies dans chaque modèle
//   - Toutes les références inter-entités passent par des ids (pas d'embed);
//     les champs dénormalisés sont résolus à la lecture (voir dto)
//
// ============================================================================

pub mod health;
pub mod users;
pub mod courses;
pub mod lessons;
pub mod lesson_access;
pub mod purchase_history;
pub mod payment_transactions;
pub mod enrollments;
pub mod dto;
