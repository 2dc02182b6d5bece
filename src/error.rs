// DANS : src/error.rs

use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use thiserror::Error;

/// Les erreurs métier du cœur de décision. Chacune est traitée à la frontière
/// du handler concerné : aucune ne doit faire tomber une boucle d'abonnement.
#[derive(Debug, Error)]
pub enum SniperError {
    /// Aucun des deux côtés du pool ne correspond à l'actif de référence.
    /// Le pool est invalorisable : on l'ignore définitivement.
    #[error("pool invalorisable : ni {coin} ni {pc} n'est l'actif de référence")]
    Configuration { coin: Pubkey, pc: Pubkey },

    /// Données de compte malformées. On saute cette observation.
    #[error("données de compte illisibles : {0}")]
    Decode(String),

    /// La résolution du mint par signature n'a rien donné avant l'échéance.
    /// Non fatal : le retrait restera non signalé jusqu'à une prochaine
    /// classification réussie.
    #[error("résolution du mint abandonnée après {0:?}")]
    LookupTimeout(Duration),

    /// Aucun endpoint du relay n'a accepté le bundle. Le déclencheur est
    /// perdu pour cette observation ; la prochaine observation qualifiante
    /// re-déclenchera.
    #[error("aucun endpoint du relay n'a accepté le bundle")]
    RelayUnavailable,

    /// Le solde du portefeuille n'a pas pu être obtenu (ou est nul).
    /// La vente est différée à la prochaine observation qualifiante.
    #[error("solde du portefeuille indisponible pour {0}")]
    BalanceUnavailable(Pubkey),
}
