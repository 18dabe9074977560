use derive_new::new;

// パスワードは平文で受け取り、サービス層でハッシュ化してから保存する
#[derive(new)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, new)]
pub struct UpdateProfile {
    pub email: String,
    pub name: String,
}
