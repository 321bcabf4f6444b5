use std::collections::{HashMap, HashSet};

use store::{
    Database, StoreError,
    models::{Donation, DonationRef, DonationSummary, User, UserRef, UserSummary},
};
use uuid::Uuid;

/// Users referenced by a batch of documents, loaded once per response.
pub struct Directory {
    users: HashMap<Uuid, User>,
}

impl Directory {
    pub async fn load(
        db: &Database,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> Result<Self, StoreError> {
        let mut users = HashMap::new();

        for id in ids.into_iter().collect::<HashSet<_>>() {
            if let Some(user) = db.get::<User>(id).await? {
                users.insert(id, user);
            }
        }

        Ok(Self { users })
    }

    /// Full name only.
    pub fn named(&self, id: Uuid) -> UserRef {
        self.users
            .get(&id)
            .map(|user| UserRef::Summary(UserSummary::named(user)))
            .unwrap_or(UserRef::Id(id))
    }

    /// Full name and email.
    pub fn contact(&self, id: Uuid) -> UserRef {
        self.users
            .get(&id)
            .map(|user| UserRef::Summary(UserSummary::contact(user)))
            .unwrap_or(UserRef::Id(id))
    }
}

pub async fn donation_refs(
    db: &Database,
    ids: impl IntoIterator<Item = Uuid>,
) -> Result<HashMap<Uuid, DonationRef>, StoreError> {
    let mut refs = HashMap::new();

    for id in ids.into_iter().collect::<HashSet<_>>() {
        let reference = match db.get::<Donation>(id).await? {
            Some(donation) => DonationRef::Summary(DonationSummary::from(&donation)),
            None => DonationRef::Id(id),
        };
        refs.insert(id, reference);
    }

    Ok(refs)
}
