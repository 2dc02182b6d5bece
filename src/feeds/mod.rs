// src/feeds/mod.rs

// Chaque source d'événements (comptes de pools, logs de transactions) est
// poussée dans son propre canal borné et consommée un événement à la fois
// par une tâche dédiée. Les sources progressent indépendamment ; aucun
// ordre global n'existe entre elles.
pub mod accounts;
pub mod logs;
