//! Batch mailing to candidate cohorts.
//!
//! A mailing selects its recipients by formation or etablissement, with
//! optional filters on dossier state, boarding, and login history, then
//! sends one message per candidate through the gateway. Candidates already
//! reached by a previous run are skipped, and one undeliverable address
//! never stops the rest of the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{CodeFormation, Dossier, EtatDossier, NumeroDossier};
use super::repository::{Courriel, MailGateway, Parametrage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mailing {
    pub de: String,
    pub repondre_a: String,
    /// Send a copy to the guardians that have an address on file.
    #[serde(default)]
    pub copie_responsables: bool,
    /// Cohort: candidates of this formation...
    #[serde(default)]
    pub formation: Option<CodeFormation>,
    /// ...or, when no formation is picked, of this etablissement.
    #[serde(default)]
    pub etablissement: Option<String>,
    /// Only candidates whose dossier is in this state.
    #[serde(default)]
    pub etat_dossier: Option<EtatDossier>,
    /// `Some(true)`: only candidates who logged in at least once;
    /// `Some(false)`: only those who never did.
    #[serde(default)]
    pub connexion: Option<bool>,
    /// Only candidates not seen since this instant.
    #[serde(default)]
    pub derniere_connexion_avant: Option<DateTime<Utc>>,
    /// Only candidates seen since this instant.
    #[serde(default)]
    pub derniere_connexion_apres: Option<DateTime<Utc>>,
    /// Only candidates on a wish with/without boarding.
    #[serde(default)]
    pub internat: Option<bool>,
    pub sujet: String,
    pub message: String,
    #[serde(default = "Mailing::brouillon_par_defaut")]
    pub brouillon: bool,
    /// Candidates already reached, with the guardian copies that went out.
    #[serde(default)]
    pub envois: Vec<Envoi>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envoi {
    pub candidat: NumeroDossier,
    pub date: DateTime<Utc>,
    pub copies_responsables: usize,
}

/// Outcome of one batch run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BilanMailing {
    pub envoyes: usize,
    pub echecs: usize,
    pub deja_contactes: usize,
}

impl Mailing {
    fn brouillon_par_defaut() -> bool {
        true
    }

    fn deja_envoye(&self, candidat: NumeroDossier) -> bool {
        self.envois.iter().any(|envoi| envoi.candidat == candidat)
    }

    /// Whether a dossier belongs to the mailing's cohort.
    fn cible(&self, dossier: &Dossier, parametrage: &dyn Parametrage) -> bool {
        let voeux_cohorte: Vec<_> = dossier
            .voeux
            .iter()
            .filter(|voeu| match (self.formation, self.etablissement.as_deref()) {
                (Some(formation), _) => voeu.formation == formation,
                (None, Some(uai)) => parametrage
                    .formation(voeu.formation)
                    .map(|formation| formation.etablissement == uai)
                    .unwrap_or(false),
                (None, None) => false,
            })
            .collect();
        if voeux_cohorte.is_empty() {
            return false;
        }

        if let Some(internat) = self.internat {
            if !voeux_cohorte.iter().any(|voeu| voeu.internat == internat) {
                return false;
            }
        }

        if let Some(etat_attendu) = self.etat_dossier {
            let uai = match (self.etablissement.as_deref(), voeux_cohorte.first()) {
                (Some(uai), _) => Some(uai.to_string()),
                (None, Some(voeu)) => parametrage
                    .formation(voeu.formation)
                    .map(|formation| formation.etablissement),
                _ => None,
            };
            let Some(etablissement) = uai.and_then(|uai| parametrage.etablissement(&uai)) else {
                return false;
            };
            if dossier.etat_dossier(etablissement.fiches.iter()) != etat_attendu {
                return false;
            }
        }

        let derniere = dossier.candidat.compte.derniere_connexion;
        if let Some(connexion) = self.connexion {
            if connexion != derniere.is_some() {
                return false;
            }
        }
        if let Some(apres) = self.derniere_connexion_apres {
            if !derniere.map(|date| date >= apres).unwrap_or(false) {
                return false;
            }
        }
        if let Some(avant) = self.derniere_connexion_avant {
            if !derniere.map(|date| date <= avant).unwrap_or(true) {
                return false;
            }
        }

        true
    }

    /// Run the batch over the given dossiers. Bounded sequential loop; each
    /// failed send is counted and logged, then the loop moves on.
    pub fn envoyer<M: MailGateway>(
        &mut self,
        dossiers: &[Dossier],
        parametrage: &dyn Parametrage,
        gateway: &M,
        maintenant: DateTime<Utc>,
    ) -> BilanMailing {
        let mut bilan = BilanMailing::default();

        for dossier in dossiers {
            if !self.cible(dossier, parametrage) {
                continue;
            }
            if self.deja_envoye(dossier.candidat.dossier) {
                bilan.deja_contactes += 1;
                continue;
            }

            let cc: Vec<String> = if self.copie_responsables {
                dossier
                    .responsables
                    .iter()
                    .filter(|responsable| !responsable.email.is_empty())
                    .map(|responsable| responsable.email.clone())
                    .collect()
            } else {
                Vec::new()
            };

            let courriel = Courriel {
                de: self.de.clone(),
                a: dossier.candidat.compte.email.clone(),
                cc: cc.clone(),
                repondre_a: Some(self.repondre_a.clone()),
                sujet: self.sujet.clone(),
                corps: self.message.clone(),
            };

            match gateway.envoyer(&courriel) {
                Ok(()) => {
                    self.envois.push(Envoi {
                        candidat: dossier.candidat.dossier,
                        date: maintenant,
                        copies_responsables: cc.len(),
                    });
                    bilan.envoyes += 1;
                }
                Err(erreur) => {
                    warn!(
                        candidat = %dossier.candidat.dossier,
                        %erreur,
                        "message non remis, on poursuit le lot"
                    );
                    bilan.echecs += 1;
                }
            }
        }

        if bilan.envoyes > 0 {
            self.brouillon = false;
        }
        bilan
    }
}
