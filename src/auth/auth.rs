use crate::api::error::ApiError;
use crate::config::Config;
use crate::{
    auth::jwt::verify_token,
    model::role::Role,
    models::{Claims, TokenType},
};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Only access tokens authenticate requests; invitation tokens are rejected here.
    pub fn from_claims(claims: Claims) -> Option<Self> {
        if claims.token_type != TokenType::Access {
            return None;
        }
        Some(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role: claims.role,
        })
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only"))
        }
    }

    pub fn require_employee(&self) -> Result<(), ApiError> {
        if self.is_employee() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Employees only"))
        }
    }

    /// Returns true if the user is an employee
    pub fn is_employee(&self) -> bool {
        self.role.tracks_attendance()
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by the auth middleware on the protected scope
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ))
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        match AuthUser::from_claims(claims) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("Invalid token type"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_invite_token};
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_user_set_by_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(AuthUser {
            user_id: "u1".to_string(),
            email: "u1@company.com".to_string(),
            role: Role::Employee,
        });

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, "u1");
        assert!(user.is_employee());
    }

    #[actix_web::test]
    async fn bearer_header_needs_an_access_token() {
        let config = Config::for_tests();
        let access = generate_access_token("u2", "u2@company.com", Role::Admin, &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config.clone()))
            .insert_header(("Authorization", format!("Bearer {}", access)))
            .to_http_request();
        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.role, Role::Admin);
        assert!(user.require_admin().is_ok());

        let (invite, _) = generate_invite_token("u2", "new@company.com", &config.jwt_secret, 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {}", invite)))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());

        let req = TestRequest::default().to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }
}
