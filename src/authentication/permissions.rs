use crate::database::schema::UserRole;
use crate::jwt::SessionData;

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMembership,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageOwnProfile,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMembership,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageOwnProfile,
            ActionType::ManageAllRecipes,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnMembership,
    ManageOwnSubscriptions,
    ManageOwnProfile,

    ManageUsers,
    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let user_role = &session.user_role;

        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if user_role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            email: "a@b.c".to_string(),
            username: "a".to_string(),
            is_admin: role == UserRole::Admin,
            user_role: role,
        }
    }

    #[test]
    fn regular_users_manage_their_own_things() {
        let s = session(UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&s));
        assert!(ActionType::ManageOwnMembership.authenticate(&s));
        assert!(!ActionType::ManageAllRecipes.authenticate(&s));
    }

    #[test]
    fn admins_manage_everything() {
        let s = session(UserRole::Admin);
        assert!(ActionType::ManageAllRecipes.authenticate(&s));
        assert!(ActionType::ManageUsers.authenticate(&s));
    }
}
