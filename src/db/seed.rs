use crate::db::ProfileStore;
use crate::domain::models::{NewPatient, NewProfile, NewPsychologist, RiskLevel, UserRole};
use crate::services::auth::hash_password;
use anyhow::Result;
use chrono::NaiveDate;
use uuid::Uuid;

struct SeedUser<'a> {
    email: &'a str,
    password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    role: UserRole,
    phone: &'a str,
    date_of_birth: Option<(i32, u32, u32)>,
    gender: Option<&'a str>,
    practice: Option<SeedPractice<'a>>,
}

struct SeedPractice<'a> {
    license_number: &'a str,
    specializations: &'a [&'a str],
    years_experience: i32,
    consultation_fee: f64,
    bio: &'a str,
}

fn demo_users() -> Vec<SeedUser<'static>> {
    vec![
        SeedUser {
            email: "admin@eunonia.com",
            password: "Admin123!",
            first_name: "Ana",
            last_name: "Administradora",
            role: UserRole::Admin,
            phone: "+1234567890",
            date_of_birth: None,
            gender: None,
            practice: None,
        },
        SeedUser {
            email: "dr.garcia@eunonia.com",
            password: "Psico123!",
            first_name: "María",
            last_name: "García",
            role: UserRole::Psychologist,
            phone: "+1234567891",
            date_of_birth: None,
            gender: None,
            practice: Some(SeedPractice {
                license_number: "PSY-2024-001",
                specializations: &["Ansiedad", "Depresión", "Terapia Cognitivo-Conductual"],
                years_experience: 8,
                consultation_fee: 75.0,
                bio: "Especialista en trastornos de ansiedad y depresión con 8 años de experiencia.",
            }),
        },
        SeedUser {
            email: "dr.ruiz@eunonia.com",
            password: "Psico123!",
            first_name: "Carlos",
            last_name: "Ruiz",
            role: UserRole::Psychologist,
            phone: "+1234567892",
            date_of_birth: None,
            gender: None,
            practice: Some(SeedPractice {
                license_number: "PSY-2024-002",
                specializations: &["Trauma", "PTSD", "Terapia Familiar"],
                years_experience: 12,
                consultation_fee: 85.0,
                bio: "Experto en trauma y terapia familiar con más de 12 años de experiencia.",
            }),
        },
        SeedUser {
            email: "juan.perez@email.com",
            password: "Paciente123!",
            first_name: "Juan",
            last_name: "Pérez",
            role: UserRole::Patient,
            phone: "+1234567893",
            date_of_birth: Some((1990, 5, 15)),
            gender: Some("M"),
            practice: None,
        },
        SeedUser {
            email: "maria.gonzalez@email.com",
            password: "Paciente123!",
            first_name: "María",
            last_name: "González",
            role: UserRole::Patient,
            phone: "+1234567894",
            date_of_birth: Some((1985, 8, 22)),
            gender: Some("F"),
            practice: None,
        },
        SeedUser {
            email: "ana.martinez@email.com",
            password: "Paciente123!",
            first_name: "Ana",
            last_name: "Martínez",
            role: UserRole::Patient,
            phone: "+1234567895",
            date_of_birth: Some((1992, 12, 3)),
            gender: Some("F"),
            practice: None,
        },
        SeedUser {
            email: "luis.garcia@email.com",
            password: "Paciente123!",
            first_name: "Luis",
            last_name: "García",
            role: UserRole::Patient,
            phone: "+1234567896",
            date_of_birth: Some((1988, 3, 18)),
            gender: Some("M"),
            practice: None,
        },
    ]
}

/// Creates the demo accounts. Accounts whose email already exists are left untouched.
pub async fn seed_demo_users(store: &dyn ProfileStore) -> Result<usize> {
    let mut created = 0;
    let mut psychologists: Vec<Uuid> = Vec::new();
    let mut patient_index = 0usize;

    for user in demo_users() {
        if let Some(existing) = store.find_profile_by_email(user.email).await? {
            if existing.user_type == UserRole::Psychologist {
                psychologists.push(existing.id);
            }
            if existing.user_type == UserRole::Patient {
                patient_index += 1;
            }
            continue;
        }

        let profile = store
            .create_profile(NewProfile {
                first_name: user.first_name.to_string(),
                last_name: user.last_name.to_string(),
                email: user.email.to_string(),
                hashed_password: hash_password(user.password)?,
                user_type: user.role,
                phone: Some(user.phone.to_string()),
                date_of_birth: user
                    .date_of_birth
                    .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
                gender: user.gender.map(str::to_string),
            })
            .await
            .map_err(|e| anyhow::anyhow!("seeding {} failed: {e}", user.email))?;

        match (user.role, user.practice) {
            (UserRole::Psychologist, Some(practice)) => {
                store
                    .create_psychologist(NewPsychologist {
                        id: profile.id,
                        license_number: practice.license_number.to_string(),
                        specializations: practice.specializations.iter().map(|s| s.to_string()).collect(),
                        years_experience: Some(practice.years_experience),
                        consultation_fee: Some(practice.consultation_fee),
                        bio: Some(practice.bio.to_string()),
                    })
                    .await
                    .map_err(|e| anyhow::anyhow!("seeding {} failed: {e}", user.email))?;
                psychologists.push(profile.id);
            }
            (UserRole::Patient, _) => {
                // alternate patients between the demo psychologists
                let assigned = (!psychologists.is_empty())
                    .then(|| psychologists[patient_index % psychologists.len()]);
                store
                    .create_patient(NewPatient {
                        id: profile.id,
                        assigned_psychologist: assigned,
                        risk_level: RiskLevel::Low,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| anyhow::anyhow!("seeding {} failed: {e}", user.email))?;
                patient_index += 1;
            }
            _ => {}
        }

        tracing::info!("Seeded demo user {} ({})", user.email, user.role.as_str());
        created += 1;
    }
    Ok(created)
}
