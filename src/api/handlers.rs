use bytes::{Buf, Bytes};
use futures_util::TryStreamExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use warp::{
    filters::multipart::{FormData, Part},
    http::{Method, StatusCode},
    reply::{self, Response},
    Reply,
};

use crate::{
    actions,
    constants::SHOPPING_LIST_FILENAME,
    error::{Error, HtmlError},
    filters::{QueryParams, RecipeFilter},
    form::{LoginForm, RecipeForm, RegisterForm, SetPasswordForm},
    jwt::SessionData,
    media,
    pagination::{PageContext, Pagination},
    permissions::{authorize, Access, Permission},
    schema::{Id, Recipe, RecipeRelation},
    serializers::{self, recipe_short, RecipeRepr, UserRepr},
    shopping_list,
    validators::{validate_recipe_form, validate_register_form, RecipeChanges},
};

use super::routes::ApiContext;

const USER_PERMISSIONS: &[Permission] = &[Permission::AllowAny];
const ACCOUNT_PERMISSIONS: &[Permission] = &[Permission::IsAuthenticated];
const CATALOG_PERMISSIONS: &[Permission] = &[Permission::ReadOnly];
const RECIPE_PERMISSIONS: &[Permission] = &[
    Permission::IsAuthenticatedOrReadOnly,
    Permission::IsOwnerOrReadOnly,
];

fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body)
        .map_err(|e| HtmlError::InvalidRequest.new(&format!("JSON parse error - {e}")))
}

/// Authorizes the request and returns the requester, who must be identified.
fn authenticated(
    permissions: &[Permission],
    method: &Method,
    session: Option<SessionData>,
) -> Result<SessionData, Error> {
    authorize(permissions, &Access::new(method, session.as_ref()))?;
    session.ok_or_else(|| HtmlError::Unauthorized.default())
}

fn viewer(session: &Option<SessionData>) -> Option<Id> {
    session.as_ref().map(|session| session.user_id)
}

/// `recipes_limit=0` means no limit.
fn recipes_limit(params: &QueryParams) -> Result<Option<usize>, Error> {
    Ok(params
        .parse::<usize>("recipes_limit")?
        .filter(|limit| *limit > 0))
}

async fn recipe_repr(
    ctx: &ApiContext,
    recipe_id: Id,
    viewer: Option<Id>,
) -> Result<RecipeRepr, Error> {
    let row = actions::fetch_recipe(&ctx.pool, recipe_id, viewer)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    actions::recipe_reprs(&ctx.pool, vec![row], viewer, &ctx.config.media_url)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

// Users

pub async fn list_users(
    params: QueryParams,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(USER_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let pagination = Pagination::from_params(&params, ctx.config.page_size)?;
    let (rows, total) = actions::list_users(&ctx.pool, viewer(&session), pagination).await?;

    let page = PageContext::from_rows(rows, total, pagination, &params, "/api/users/")?
        .map(UserRepr::from);
    Ok(json_response(&page, StatusCode::OK))
}

pub async fn register(
    session: Option<SessionData>,
    body: Bytes,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(USER_PERMISSIONS, &Access::new(&Method::POST, session.as_ref()))?;

    let form: RegisterForm = parse_json(&body)?;
    validate_register_form(&form)?;

    let user = actions::register_user(&ctx.pool, &form).await?;
    Ok(json_response(&UserRepr::own(user), StatusCode::CREATED))
}

pub async fn me(session: Option<SessionData>, ctx: ApiContext) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::GET, session)?;

    let user = actions::get_user_by_id(&ctx.pool, session.user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    Ok(json_response(&UserRepr::own(user), StatusCode::OK))
}

pub async fn user_detail(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(USER_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let user = actions::fetch_user(&ctx.pool, id, viewer(&session))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    Ok(json_response(&UserRepr::from(user), StatusCode::OK))
}

pub async fn set_password(
    session: Option<SessionData>,
    body: Bytes,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::POST, session)?;

    let form: SetPasswordForm = parse_json(&body)?;
    actions::set_password(&ctx.pool, session.user_id, &form).await?;
    Ok(no_content())
}

pub async fn list_subscriptions(
    params: QueryParams,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::GET, session)?;

    let limit = recipes_limit(&params)?;
    let pagination = Pagination::from_params(&params, ctx.config.page_size)?;
    let (authors, total) =
        actions::list_subscriptions(&ctx.pool, session.user_id, pagination).await?;

    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    let recipes = actions::fetch_author_recipes(&ctx.pool, &author_ids).await?;
    let results = serializers::subscriptions(authors, recipes, limit, &ctx.config.media_url);

    let page = PageContext::from_rows(
        results,
        total,
        pagination,
        &params,
        "/api/users/subscriptions/",
    )?;
    Ok(json_response(&page, StatusCode::OK))
}

pub async fn subscribe(
    id: Id,
    params: QueryParams,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::POST, session)?;
    let limit = recipes_limit(&params)?;

    actions::get_user_by_id(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    actions::subscribe(&ctx.pool, session.user_id, id).await?;

    let author = actions::fetch_author(&ctx.pool, id, session.user_id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    let recipes = actions::fetch_author_recipes(&ctx.pool, &[id]).await?;

    let mut results =
        serializers::subscriptions(vec![author], recipes, limit, &ctx.config.media_url);
    let subscription = results.pop().ok_or_else(|| HtmlError::NotFound.default())?;
    Ok(json_response(&subscription, StatusCode::CREATED))
}

pub async fn unsubscribe(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::DELETE, session)?;

    actions::get_user_by_id(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    actions::unsubscribe(&ctx.pool, session.user_id, id).await?;
    Ok(no_content())
}

// Tokens

pub async fn login(body: Bytes, ctx: ApiContext) -> Result<Response, Error> {
    let form: LoginForm = parse_json(&body)?;
    let token = actions::login_user(&ctx.pool, &form, &ctx.config).await?;
    Ok(json_response(&json!({ "auth_token": token }), StatusCode::OK))
}

pub async fn logout(session: Option<SessionData>, ctx: ApiContext) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::POST, session)?;

    actions::revoke_token(&ctx.pool, &session).await?;
    log::info!("User {} logged out", session.user_id);
    Ok(no_content())
}

// Tags and ingredients

pub async fn list_tags(session: Option<SessionData>, ctx: ApiContext) -> Result<Response, Error> {
    authorize(CATALOG_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let tags = actions::list_tags(&ctx.pool).await?;
    Ok(json_response(&tags, StatusCode::OK))
}

pub async fn tag_detail(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(CATALOG_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let tag = actions::get_tag(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    Ok(json_response(&tag, StatusCode::OK))
}

pub async fn list_ingredients(
    params: QueryParams,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(CATALOG_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let ingredients = actions::list_ingredients(&ctx.pool, params.get("name")).await?;
    Ok(json_response(&ingredients, StatusCode::OK))
}

pub async fn ingredient_detail(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(CATALOG_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let ingredient = actions::get_ingredient(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    Ok(json_response(&ingredient, StatusCode::OK))
}

// Recipes

pub async fn list_recipes(
    params: QueryParams,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(RECIPE_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let viewer = viewer(&session);
    let filter = RecipeFilter::from_params(&params)?;
    let pagination = Pagination::from_params(&params, ctx.config.page_size)?;

    let (rows, total) = actions::fetch_recipes(&ctx.pool, &filter, viewer, pagination).await?;
    let results = actions::recipe_reprs(&ctx.pool, rows, viewer, &ctx.config.media_url).await?;

    let page = PageContext::from_rows(results, total, pagination, &params, "/api/recipes/")?;
    Ok(json_response(&page, StatusCode::OK))
}

pub async fn recipe_detail(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    authorize(RECIPE_PERMISSIONS, &Access::new(&Method::GET, session.as_ref()))?;

    let recipe = recipe_repr(&ctx, id, viewer(&session)).await?;
    Ok(json_response(&recipe, StatusCode::OK))
}

/// Decodes and stores the data URI of `changes.image`, if any.
async fn store_changed_image(
    ctx: &ApiContext,
    changes: &RecipeChanges,
) -> Result<Option<String>, Error> {
    match &changes.image {
        Some(uri) => {
            let image =
                media::decode_data_uri(uri).map_err(|message| Error::field("image", &message))?;
            let path =
                media::store_image(&ctx.config.media_root, &image.bytes, image.extension).await?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

pub async fn create_recipe(
    session: Option<SessionData>,
    body: Bytes,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(RECIPE_PERMISSIONS, &Method::POST, session)?;

    let form: RecipeForm = parse_json(&body)?;
    let changes = validate_recipe_form(form, false)?;
    let image = store_changed_image(&ctx, &changes)
        .await?
        .ok_or_else(|| Error::field("image", "This field is required."))?;

    let recipe_id = match actions::create_recipe(&ctx.pool, session.user_id, &changes, &image).await
    {
        Ok(recipe_id) => recipe_id,
        Err(e) => {
            media::remove_image(&ctx.config.media_root, &image).await;
            return Err(e);
        }
    };

    let recipe = recipe_repr(&ctx, recipe_id, Some(session.user_id)).await?;
    Ok(json_response(&recipe, StatusCode::CREATED))
}

/// Loads the recipe and checks that the requester may modify it.
async fn owned_recipe(
    ctx: &ApiContext,
    id: Id,
    method: &Method,
    session: Option<SessionData>,
) -> Result<(SessionData, Recipe), Error> {
    let session = authenticated(RECIPE_PERMISSIONS, method, session)?;

    let recipe = actions::get_recipe(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    authorize(
        RECIPE_PERMISSIONS,
        &Access::new(method, Some(&session)).with_owner(recipe.author_id),
    )?;

    Ok((session, recipe))
}

pub async fn update_recipe(
    id: Id,
    method: Method,
    session: Option<SessionData>,
    body: Bytes,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let (session, recipe) = owned_recipe(&ctx, id, &method, session).await?;

    let form: RecipeForm = parse_json(&body)?;
    let changes = validate_recipe_form(form, true)?;
    let image = store_changed_image(&ctx, &changes).await?;

    if let Err(e) = actions::update_recipe(&ctx.pool, recipe.id, &changes, image.as_deref()).await {
        if let Some(image) = &image {
            media::remove_image(&ctx.config.media_root, image).await;
        }
        return Err(e);
    }
    if image.is_some() {
        media::remove_image(&ctx.config.media_root, &recipe.image).await;
    }

    let recipe = recipe_repr(&ctx, recipe.id, Some(session.user_id)).await?;
    Ok(json_response(&recipe, StatusCode::OK))
}

async fn read_image_part(form: FormData) -> Result<Option<(String, Vec<u8>)>, Error> {
    let parts: Vec<Part> = form.try_collect().await.map_err(|e| {
        log::debug!("Malformed multipart body: {e}");
        HtmlError::InvalidRequest.new("Malformed multipart body.")
    })?;

    for part in parts {
        if part.name() != "image" {
            continue;
        }
        let filename = part.filename().unwrap_or_default().to_string();
        let bytes = part
            .stream()
            .try_fold(Vec::new(), |mut bytes, chunk| async move {
                bytes.extend_from_slice(chunk.chunk());
                Ok(bytes)
            })
            .await
            .map_err(|e| {
                log::debug!("Failed to read upload: {e}");
                HtmlError::InvalidRequest.new("Malformed multipart body.")
            })?;
        return Ok(Some((filename, bytes)));
    }

    Ok(None)
}

pub async fn upload_image(
    id: Id,
    session: Option<SessionData>,
    form: FormData,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let (session, recipe) = owned_recipe(&ctx, id, &Method::PUT, session).await?;

    let (filename, bytes) = read_image_part(form)
        .await?
        .ok_or_else(|| Error::field("image", "No file was submitted."))?;
    if bytes.is_empty() {
        return Err(Error::field("image", "The submitted file is empty."));
    }
    let extension =
        media::upload_extension(&filename).map_err(|message| Error::field("image", &message))?;

    let path = media::store_image(&ctx.config.media_root, &bytes, extension).await?;
    if let Err(e) = actions::set_recipe_image(&ctx.pool, recipe.id, &path).await {
        media::remove_image(&ctx.config.media_root, &path).await;
        return Err(e);
    }
    media::remove_image(&ctx.config.media_root, &recipe.image).await;

    let recipe = recipe_repr(&ctx, recipe.id, Some(session.user_id)).await?;
    Ok(json_response(&recipe, StatusCode::OK))
}

pub async fn delete_recipe(
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let (_, recipe) = owned_recipe(&ctx, id, &Method::DELETE, session).await?;

    let deleted = actions::delete_recipe(&ctx.pool, recipe.id).await?;
    media::remove_image(&ctx.config.media_root, &deleted.image).await;
    Ok(no_content())
}

// Favorites and shopping cart

pub async fn add_relation(
    relation: RecipeRelation,
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::POST, session)?;

    let recipe = actions::get_recipe_short(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    let outcome = actions::add_relation(
        &ctx.pool,
        relation,
        session.user_id,
        recipe.id,
        ctx.config.toggle_mode,
    )
    .await?;

    let status = match outcome {
        actions::ToggleOutcome::Created => StatusCode::CREATED,
        actions::ToggleOutcome::AlreadyPresent => StatusCode::OK,
    };
    Ok(json_response(
        &recipe_short(recipe, &ctx.config.media_url),
        status,
    ))
}

pub async fn remove_relation(
    relation: RecipeRelation,
    id: Id,
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::DELETE, session)?;

    actions::get_recipe_short(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;
    actions::remove_relation(&ctx.pool, relation, session.user_id, id).await?;
    Ok(no_content())
}

pub async fn download_shopping_cart(
    session: Option<SessionData>,
    ctx: ApiContext,
) -> Result<Response, Error> {
    let session = authenticated(ACCOUNT_PERMISSIONS, &Method::GET, session)?;

    let rows = actions::shopping_list_rows(&ctx.pool, session.user_id).await?;
    let document = shopping_list::render(&shopping_list::aggregate(rows));

    let response = reply::with_header(
        document,
        "Content-Disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(response.into_response())
}
