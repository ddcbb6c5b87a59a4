//! Create-or-update of the local registry from a normalized admission
//! record, and the fiche reconciliation that follows every wish change.
//!
//! Parcoursup redelivers: the same candidate can arrive several times with
//! identical or amended facts. The whole operation is therefore written to
//! be idempotent (re-running it with the same payload leaves the aggregate
//! byte-for-byte identical, appends no history, duplicates no guardian) and
//! atomic: the aggregate is saved once, at the end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::workflows::parcoursup::mapping;
use crate::workflows::parcoursup::payload::{
    AdmissionParcoursup, CandidatParcoursup, PayloadError,
};

use super::domain::{
    Candidat, CodeFormation, CompteCandidat, Dossier, HistoriqueVoeu, NumeroDossier,
    ResponsableLegal, Voeu, VoeuActuelError,
};
use super::fiches;
use super::parametrage::{Etablissement, Formation};
use super::repository::{Courriel, DossierStore, MailGateway, Parametrage, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("formation {code} inconnue du paramétrage")]
    FormationInconnue { code: CodeFormation },
    #[error("établissement {uai} inconnu du paramétrage")]
    EtablissementInconnu { uai: String },
    #[error("candidat {dossier} inconnu")]
    CandidatInconnu { dossier: NumeroDossier },
    #[error("dossier {dossier}: {nombre} vœux simultanément acceptés")]
    VoeuxMultiples { dossier: NumeroDossier, nombre: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a batch import: per-record failures are collected, never
/// fatal to the rest of the batch.
#[derive(Debug, Default)]
pub struct BilanImport {
    pub importes: usize,
    pub rejets: Vec<RejetImport>,
}

#[derive(Debug)]
pub struct RejetImport {
    pub reference: String,
    pub erreur: String,
}

/// Service composing the aggregate store, the institutional referential,
/// and the outbound mail gateway.
///
/// Notifications for distinct candidates may run in parallel; two
/// notifications for the same candidate are serialized on a per-dossier
/// lock, so the read-modify-write of the aggregate never loses an update.
pub struct ImportService<S, P, M> {
    store: Arc<S>,
    parametrage: Arc<P>,
    courrier: Arc<M>,
    verrous: Mutex<HashMap<NumeroDossier, Arc<Mutex<()>>>>,
}

impl<S, P, M> ImportService<S, P, M>
where
    S: DossierStore + 'static,
    P: Parametrage + 'static,
    M: MailGateway + 'static,
{
    pub fn new(store: Arc<S>, parametrage: Arc<P>, courrier: Arc<M>) -> Self {
        Self {
            store,
            parametrage,
            courrier,
            verrous: Mutex::new(HashMap::new()),
        }
    }

    fn verrou(&self, numero: NumeroDossier) -> Arc<Mutex<()>> {
        let mut verrous = self.verrous.lock().expect("mutex des verrous");
        verrous
            .entry(numero)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn parametrage(&self) -> &Arc<P> {
        &self.parametrage
    }

    pub fn courrier(&self) -> &Arc<M> {
        &self.courrier
    }

    /// Import one admission notification.
    ///
    /// Identity facts are overwritten unconditionally (Parcoursup is
    /// authoritative for them on every call); the wish is upserted by
    /// (candidat, formation, internat) with an history entry on state
    /// change; guardians are only created while the candidate has none;
    /// the fiche set is reconciled against the resulting current wish.
    pub fn import_admission(
        &self,
        admission: &AdmissionParcoursup,
    ) -> Result<Candidat, ImportError> {
        let proposition = &admission.proposition;
        let formation = self
            .parametrage
            .formation(proposition.code_formation)
            .ok_or(ImportError::FormationInconnue {
                code: proposition.code_formation,
            })?;
        let etablissement = self.etablissement_de(&formation)?;

        let numero = NumeroDossier(admission.candidat.code);
        let verrou = self.verrou(numero);
        let _garde = verrou.lock().expect("verrou du dossier empoisonné");

        let mut dossier = match self.store.charger(numero)? {
            Some(mut dossier) => {
                maj_identite(&mut dossier.candidat, &admission.candidat);
                dossier
            }
            None => Dossier::nouveau(bienvenue(numero, &admission.candidat)),
        };

        // Wish upsert. Same resolved state: nothing to journal.
        let etat = mapping::etat_voeu(proposition.etat);
        let position = dossier.voeux.iter().position(|voeu| {
            voeu.formation == proposition.code_formation && voeu.internat == proposition.internat
        });
        match position {
            Some(index) => {
                let ancien = dossier.voeux[index].etat;
                if ancien != etat {
                    dossier.historique.push(HistoriqueVoeu {
                        formation: proposition.code_formation,
                        internat: proposition.internat,
                        etat: ancien,
                        date: proposition.date,
                    });
                    dossier.voeux[index].etat = etat;
                }
                dossier.voeux[index].cesure = proposition.cesure;
            }
            None => dossier.voeux.push(Voeu {
                candidat: numero,
                formation: proposition.code_formation,
                internat: proposition.internat,
                cesure: proposition.cesure,
                etat,
            }),
        }

        // Parcoursup has no stable guardian key: create once, then leave
        // guardian rows to the UI.
        if dossier.responsables.is_empty() {
            dossier
                .responsables
                .extend(admission.responsables.iter().map(|responsable| {
                    ResponsableLegal {
                        genre: None,
                        nom: responsable.nom.clone(),
                        prenom: responsable.prenom.clone(),
                        email: responsable.email.clone(),
                        telephone: responsable.telephone.clone(),
                        telephone_mobile: String::new(),
                        adresse: String::new(),
                    }
                }));
        }

        let etablissement_accueil = etablissement.clone();
        match dossier.voeu_actuel() {
            Ok(voeu) => {
                let voeu = *voeu;
                let (formation_actuelle, etablissement_actuel) =
                    if voeu.formation == formation.code_parcoursup {
                        (formation, etablissement)
                    } else {
                        let formation_actuelle = self
                            .parametrage
                            .formation(voeu.formation)
                            .ok_or(ImportError::FormationInconnue {
                                code: voeu.formation,
                            })?;
                        let etablissement_actuel = self.etablissement_de(&formation_actuelle)?;
                        (formation_actuelle, etablissement_actuel)
                    };
                fiches::create_or_update_applicable(
                    &mut dossier,
                    voeu,
                    &etablissement_actuel,
                    &formation_actuelle,
                    Some(admission),
                    &*self.parametrage,
                );
            }
            Err(VoeuActuelError::Aucun) => fiches::annuler_toutes(&mut dossier),
            Err(VoeuActuelError::Plusieurs(nombre)) => {
                // Anomaly: nothing persisted, surfaced for staff review.
                return Err(ImportError::VoeuxMultiples {
                    dossier: numero,
                    nombre,
                });
            }
        }

        if !dossier.candidat.email_bienvenue_envoye {
            let courriel = courriel_bienvenue(&dossier.candidat, &etablissement_accueil);
            match self.courrier.envoyer(&courriel) {
                Ok(()) => dossier.candidat.email_bienvenue_envoye = true,
                Err(erreur) => {
                    // Retried on the next notification; never aborts.
                    warn!(dossier = %numero, %erreur, "échec de l'e-mail de bienvenue");
                }
            }
        }

        let candidat = dossier.candidat.clone();
        self.store.sauvegarder(dossier)?;
        Ok(candidat)
    }

    /// Batch import, one `Result` per record as produced by the client or
    /// the CSV reader. A record that fails, at parse or at import, is
    /// logged and skipped; the batch always runs to the end.
    pub fn importer_lot<I>(&self, admissions: I) -> BilanImport
    where
        I: IntoIterator<Item = Result<AdmissionParcoursup, PayloadError>>,
    {
        let mut bilan = BilanImport::default();
        for (rang, admission) in admissions.into_iter().enumerate() {
            match admission {
                Ok(admission) => {
                    let reference = admission.candidat.code.to_string();
                    match self.import_admission(&admission) {
                        Ok(_) => bilan.importes += 1,
                        Err(erreur) => {
                            warn!(candidat = %reference, %erreur, "admission rejetée");
                            bilan.rejets.push(RejetImport {
                                reference,
                                erreur: erreur.to_string(),
                            });
                        }
                    }
                }
                Err(erreur) => {
                    warn!(rang, %erreur, "enregistrement Parcoursup illisible");
                    bilan.rejets.push(RejetImport {
                        reference: format!("enregistrement {rang}"),
                        erreur: erreur.to_string(),
                    });
                }
            }
        }
        bilan
    }

    /// Record the administrative confirmation pushed back to Parcoursup.
    pub fn enregistrer_confirmation(
        &self,
        numero: NumeroDossier,
        message: &str,
    ) -> Result<Candidat, ImportError> {
        let verrou = self.verrou(numero);
        let _garde = verrou.lock().expect("verrou du dossier empoisonné");

        let mut dossier = self
            .store
            .charger(numero)?
            .ok_or(ImportError::CandidatInconnu { dossier: numero })?;
        dossier.candidat.inscription_confirmee = true;
        dossier.candidat.message_confirmation = message.to_string();
        let candidat = dossier.candidat.clone();
        self.store.sauvegarder(dossier)?;
        Ok(candidat)
    }

    fn etablissement_de(&self, formation: &Formation) -> Result<Etablissement, ImportError> {
        self.parametrage
            .etablissement(&formation.etablissement)
            .ok_or_else(|| ImportError::EtablissementInconnu {
                uai: formation.etablissement.clone(),
            })
    }
}

/// First-notification factory: provisions the account alongside the
/// candidate. The welcome e-mail itself is sent by the import once the
/// aggregate is about to be persisted.
fn bienvenue(numero: NumeroDossier, candidat: &CandidatParcoursup) -> Candidat {
    Candidat {
        dossier: numero,
        genre: candidat.sexe,
        nom: candidat.nom.clone(),
        prenom: candidat.prenom.clone(),
        adresse: candidat.adresse.clone(),
        telephone: candidat.telephone_fixe.clone(),
        telephone_mobile: candidat.telephone_mobile.clone(),
        date_naissance: candidat.date_naissance,
        ine: candidat.ine.clone(),
        bac_date: candidat.bac_date,
        bac_serie: candidat.bac_serie.clone(),
        bac_mention: candidat.bac_mention,
        compte: CompteCandidat {
            email: candidat.email.clone(),
            derniere_connexion: None,
        },
        email_bienvenue_envoye: false,
        inscription_confirmee: false,
        message_confirmation: String::new(),
    }
}

/// Parcoursup is authoritative for identity facts on every notification.
fn maj_identite(candidat: &mut Candidat, facts: &CandidatParcoursup) {
    candidat.genre = facts.sexe;
    candidat.nom = facts.nom.clone();
    candidat.prenom = facts.prenom.clone();
    candidat.adresse = facts.adresse.clone();
    candidat.telephone = facts.telephone_fixe.clone();
    candidat.telephone_mobile = facts.telephone_mobile.clone();
    candidat.date_naissance = facts.date_naissance;
    candidat.ine = facts.ine.clone();
    candidat.bac_date = facts.bac_date;
    candidat.bac_serie = facts.bac_serie.clone();
    candidat.bac_mention = facts.bac_mention;
}

fn courriel_bienvenue(candidat: &Candidat, etablissement: &Etablissement) -> Courriel {
    Courriel {
        de: etablissement.email.clone(),
        a: candidat.compte.email.clone(),
        cc: Vec::new(),
        repondre_a: None,
        sujet: format!("Votre inscription à {}", etablissement.nom),
        corps: format!(
            "Bonjour {},\n\nVotre admission a bien été transmise à {}. \
             Connectez-vous à l'espace d'inscription pour compléter votre dossier.\n",
            candidat.nom_complet(),
            etablissement.nom,
        ),
    }
}
